//! Shared context for chat request handling.
//!
//! Immutable per process: every request clones the `Arc`s and builds its own
//! conversation and tool session.

use std::{sync::Arc, time::Duration};

use fantasy_mcp::ToolConnector;

use crate::llm::ModelClient;

/// Settings applied to every chat request.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Maximum number of tool-execution cycles per request.
    pub max_tool_iterations: u32,
    /// Absolute bound on a buffered (non-streaming) request.
    pub request_timeout: Duration,
    /// Bound on the live `tools/list` call before falling back to built-ins.
    pub tool_list_timeout: Duration,
    /// MCP server whose tools the assistant uses.
    pub tool_server: String,
}

#[derive(Clone)]
pub struct ChatContext {
    /// `None` when no provider credentials are configured.
    pub model_client: Option<Arc<dyn ModelClient>>,
    pub tool_connector: Arc<dyn ToolConnector>,
    pub settings: Arc<ChatSettings>,
}

impl ChatContext {
    pub fn new(
        model_client: Option<Arc<dyn ModelClient>>,
        tool_connector: Arc<dyn ToolConnector>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            model_client,
            tool_connector,
            settings: Arc::new(settings),
        }
    }
}
