use std::sync::Arc;

use super::{
    client::McpClient,
    config::McpConfig,
    service::{ToolConnector, ToolService},
};
use crate::error::{McpError, McpResult};

/// [`ToolConnector`] backed by the configured MCP servers.
///
/// Every `open` returns a new [`McpClient`]; connections are never shared
/// between requests.
#[derive(Debug, Clone)]
pub struct McpConnector {
    config: McpConfig,
}

impl McpConnector {
    pub fn new(config: McpConfig) -> McpResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl ToolConnector for McpConnector {
    fn server_names(&self) -> Vec<String> {
        self.config.server_names()
    }

    fn open(&self, server: &str) -> McpResult<Arc<dyn ToolService>> {
        let config = self
            .config
            .server(server)
            .ok_or_else(|| McpError::ServerNotFound(server.to_string()))?;
        Ok(Arc::new(McpClient::new(config.clone())))
    }
}
