//! Tool execution against the request's MCP session.
//!
//! Every outcome, including transport failures, becomes a [`ToolResult`];
//! nothing here aborts the loop.

use std::time::Instant;

use fantasy_mcp::ToolService;
use fantasy_protocol::messages::{InputContentBlock, ToolResultBlock, ToolResultContent};
use tracing::{info, warn};

use super::accumulator::ToolInvocation;
use crate::observability::metrics::Metrics;

/// Normalized outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result with the model-facing `Error calling {name}: {error}` text.
    pub fn failure(tool_use_id: impl Into<String>, name: &str, error: impl std::fmt::Display) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: format!("Error calling {}: {}", name, error),
            is_error: true,
        }
    }

    pub fn into_block(self) -> InputContentBlock {
        InputContentBlock::ToolResult(ToolResultBlock {
            tool_use_id: self.tool_use_id,
            content: Some(ToolResultContent::String(self.content)),
            is_error: self.is_error.then_some(true),
            cache_control: None,
        })
    }
}

/// Execute one invocation. Malformed arguments are never sent to the service.
pub async fn execute_tool(service: &dyn ToolService, invocation: &ToolInvocation) -> ToolResult {
    let arguments = match &invocation.input {
        Ok(arguments) => arguments.clone(),
        Err(e) => {
            warn!(tool = %invocation.name, tool_use_id = %invocation.id, error = %e, "Rejected tool call with malformed input");
            Metrics::record_tool_call(&invocation.name, false);
            return ToolResult::failure(&invocation.id, &invocation.name, e);
        }
    };

    let start = Instant::now();
    let result = match service.call_tool(&invocation.name, arguments).await {
        Ok(output) if output.is_error => {
            ToolResult::failure(&invocation.id, &invocation.name, output.to_text())
        }
        Ok(output) => ToolResult::success(&invocation.id, output.to_text()),
        Err(e) => ToolResult::failure(&invocation.id, &invocation.name, e),
    };

    Metrics::record_tool_call(&invocation.name, !result.is_error);
    if result.is_error {
        warn!(
            tool = %invocation.name,
            tool_use_id = %invocation.id,
            duration_ms = %start.elapsed().as_millis(),
            error = %result.content,
            "Tool execution failed"
        );
    } else {
        info!(
            tool = %invocation.name,
            tool_use_id = %invocation.id,
            duration_ms = %start.elapsed().as_millis(),
            "Tool execution completed"
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fantasy_mcp::{McpError, McpResult, McpTool, ToolCallOutput};
    use serde_json::{json, Value};

    use super::*;

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl ToolService for RecordingService {
        fn server_name(&self) -> &str {
            "espn"
        }

        async fn list_tools(&self) -> McpResult<Vec<McpTool>> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments.clone()));
            match name {
                "get_roster" => Ok(ToolCallOutput::text("QB: Allen")),
                "remote_error" => Ok(ToolCallOutput::error("league not found")),
                _ => Err(McpError::Transport("connection reset".to_string())),
            }
        }

        async fn close(&self) {}
    }

    fn invocation(name: &str, input: Result<Value, String>) -> ToolInvocation {
        ToolInvocation {
            id: "toolu_1".to_string(),
            name: name.to_string(),
            input,
        }
    }

    #[tokio::test]
    async fn test_success_forwards_arguments_verbatim() {
        let service = RecordingService::default();
        let result = execute_tool(&service, &invocation("get_roster", Ok(json!({"team_id": 4})))).await;

        assert_eq!(result, ToolResult::success("toolu_1", "QB: Allen"));
        assert_eq!(
            service.calls.lock().unwrap().as_slice(),
            &[("get_roster".to_string(), json!({"team_id": 4}))]
        );
    }

    #[tokio::test]
    async fn test_remote_error_flag_becomes_error_result() {
        let service = RecordingService::default();
        let result = execute_tool(&service, &invocation("remote_error", Ok(json!({})))).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Error calling remote_error: league not found");
    }

    #[tokio::test]
    async fn test_transport_error_becomes_error_result() {
        let service = RecordingService::default();
        let result = execute_tool(&service, &invocation("get_matchups", Ok(json!({})))).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Error calling get_matchups: "));
        assert!(result.content.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_malformed_input_is_not_sent() {
        let service = RecordingService::default();
        let result = execute_tool(
            &service,
            &invocation("get_roster", Err("Invalid tool input JSON: EOF".to_string())),
        )
        .await;
        assert!(result.is_error);
        assert_eq!(
            result.content,
            "Error calling get_roster: Invalid tool input JSON: EOF"
        );
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_into_block_sets_error_flag_only_on_error() {
        let ok = ToolResult::success("toolu_1", "fine").into_block();
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(
            value,
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "fine"})
        );

        let err = ToolResult::failure("toolu_2", "get_roster", "boom").into_block();
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["is_error"], json!(true));
        assert_eq!(value["content"], json!("Error calling get_roster: boom"));
    }
}
