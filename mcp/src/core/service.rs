//! Tool service abstraction.
//!
//! [`ToolService`] is what the chat orchestrator talks to: list tools, call a
//! tool, close the connection. [`ToolConnector`] hands out one service per
//! request for a named server.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpResult;

/// A tool advertised by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema of the tool arguments, as sent by the server.
    pub input_schema: Value,
}

/// Raw outcome of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutput {
    /// MCP content items (`[{"type": "text", "text": ...}, ...]`).
    pub content: Value,
    /// Set when the server reported the call as failed.
    pub is_error: bool,
}

impl ToolCallOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: serde_json::json!([{"type": "text", "text": text.into()}]),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// Flatten the content for a model-facing tool result.
    ///
    /// Text items are joined with newlines. Any other content is returned as
    /// its JSON serialization.
    pub fn to_text(&self) -> String {
        extract_output_from_value(&self.content)
    }
}

fn extract_output_from_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter_map(|item| {
                    item.get("type")
                        .and_then(|t| t.as_str())
                        .filter(|t| *t == "text")
                        .and_then(|_| item.get("text"))
                        .and_then(|t| t.as_str())
                })
                .collect();
            if texts.is_empty() {
                value.to_string()
            } else {
                texts.join("\n")
            }
        }
        other => other.to_string(),
    }
}

#[async_trait]
pub trait ToolService: Send + Sync {
    /// Name of the server this service talks to.
    fn server_name(&self) -> &str;

    async fn list_tools(&self) -> McpResult<Vec<McpTool>>;

    /// Call `name` with `arguments`, which must be a JSON object or null.
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallOutput>;

    /// Release the underlying connection. Idempotent.
    async fn close(&self);
}

/// Hands out tool services for configured servers.
pub trait ToolConnector: Send + Sync {
    fn server_names(&self) -> Vec<String>;

    /// A fresh, not-yet-connected service for `server`.
    fn open(&self, server: &str) -> McpResult<Arc<dyn ToolService>>;
}
