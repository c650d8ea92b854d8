//! MCP client over streamable HTTP.
//!
//! The client connects lazily on first use, so creating one per request is
//! free until a tool is actually listed or called. After [`McpClient::close`]
//! every operation fails with [`McpError::ConnectionClosed`].

use std::borrow::Cow;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, ClientInfo},
    service::{Peer, RunningService},
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig,
        StreamableHttpClientTransport,
    },
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    config::McpServerConfig,
    service::{McpTool, ToolCallOutput, ToolService},
};
use crate::error::{McpError, McpResult};

/// Client name announced in the MCP `initialize` handshake.
pub const CLIENT_NAME: &str = "fantasy-chat-gateway";

type McpConnection = RunningService<RoleClient, ClientInfo>;

enum ConnectionState {
    Idle,
    Connected(McpConnection),
    Closed,
}

pub struct McpClient {
    config: McpServerConfig,
    state: Mutex<ConnectionState>,
}

impl McpClient {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ConnectionState::Idle),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// Peer handle for the live connection, connecting first if needed.
    ///
    /// The lock is released before any request is sent, so a slow tool call
    /// never blocks `close`.
    async fn peer(&self) -> McpResult<Peer<RoleClient>> {
        let mut state = self.state.lock().await;
        match &*state {
            ConnectionState::Connected(service) => return Ok(service.peer().clone()),
            ConnectionState::Closed => {
                return Err(McpError::ConnectionClosed(self.config.name.clone()))
            }
            ConnectionState::Idle => {}
        }

        let service = self.connect().await?;
        let peer = service.peer().clone();
        *state = ConnectionState::Connected(service);
        Ok(peer)
    }

    async fn connect(&self) -> McpResult<McpConnection> {
        let endpoint = self.config.endpoint();
        let http_client = self.config.build_http_client()?;
        let cfg = StreamableHttpClientTransportConfig::with_uri(endpoint.as_str());
        let transport = StreamableHttpClientTransport::with_client(http_client, cfg);

        let service = client_info().serve(transport).await.map_err(|e| {
            McpError::ConnectionFailed(format!(
                "initialize streamable client for '{}': {}",
                self.config.name, e
            ))
        })?;

        info!(server = %self.config.name, endpoint = %endpoint, "Connected to MCP server");
        Ok(service)
    }
}

fn client_info() -> ClientInfo {
    let mut info = ClientInfo::default();
    info.client_info.name = CLIENT_NAME.to_string();
    info.client_info.version = env!("CARGO_PKG_VERSION").to_string();
    info
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl ToolService for McpClient {
    fn server_name(&self) -> &str {
        &self.config.name
    }

    async fn list_tools(&self) -> McpResult<Vec<McpTool>> {
        let peer = self.peer().await?;
        let tools = peer.list_all_tools().await.map_err(|e| {
            McpError::Transport(format!("list tools from '{}': {}", self.config.name, e))
        })?;

        debug!(server = %self.config.name, count = tools.len(), "Listed MCP tools");
        Ok(tools
            .into_iter()
            .map(|tool| McpTool {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallOutput> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(McpError::InvalidArguments(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let peer = self.peer().await?;
        let request = CallToolRequestParam {
            name: Cow::Owned(name.to_string()),
            arguments,
        };

        let result = peer
            .call_tool(request)
            .await
            .map_err(|e| McpError::ToolExecution(format!("MCP call failed: {}", e)))?;

        let content = serde_json::to_value(&result.content)
            .map_err(|e| McpError::ToolExecution(format!("decode tool result: {}", e)))?;

        Ok(ToolCallOutput {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, ConnectionState::Closed)
        };

        if let ConnectionState::Connected(service) = previous {
            match service.cancel().await {
                Ok(reason) => {
                    debug!(server = %self.config.name, ?reason, "Closed MCP connection")
                }
                Err(e) => {
                    warn!(server = %self.config.name, error = %e, "Error closing MCP connection")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client() -> McpClient {
        McpClient::new(McpServerConfig::new("espn", "http://127.0.0.1:9"))
    }

    #[tokio::test]
    async fn test_call_rejects_non_object_arguments_without_connecting() {
        let client = client();
        let err = client.call_tool("get_roster", json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidArguments(msg) if msg.contains("array")));
    }

    #[tokio::test]
    async fn test_operations_fail_after_close() {
        let client = client();
        client.close().await;
        client.close().await;

        assert!(matches!(
            client.list_tools().await,
            Err(McpError::ConnectionClosed(name)) if name == "espn"
        ));
        assert!(matches!(
            client.call_tool("get_roster", json!({})).await,
            Err(McpError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_client_info_name() {
        let info = client_info();
        assert_eq!(info.client_info.name, CLIENT_NAME);
    }
}
