//! Per-request tool session: one MCP connection and its resolved tool list.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use fantasy_mcp::{McpResult, ToolConnector, ToolService};
use fantasy_protocol::messages::Tool;
use tracing::debug;

use super::registry::{resolve_tools, ToolSource};

/// Owns the tool connection of one request.
///
/// [`ToolSession::close`] must be called on every exit path; dropping an
/// unclosed session spawns the close on the current runtime.
pub struct ToolSession {
    service: Arc<dyn ToolService>,
    tools: Vec<Tool>,
    tool_names: HashSet<String>,
    source: ToolSource,
    closed: AtomicBool,
}

impl ToolSession {
    /// Open a service for `server` and resolve its tools once.
    pub async fn open(
        connector: &dyn ToolConnector,
        server: &str,
        tool_list_timeout: Duration,
    ) -> McpResult<Self> {
        let service = connector.open(server)?;
        Ok(Self::with_service(service, tool_list_timeout).await)
    }

    pub async fn with_service(service: Arc<dyn ToolService>, tool_list_timeout: Duration) -> Self {
        let (tools, source) = resolve_tools(service.as_ref(), tool_list_timeout).await;
        let tool_names = tools.iter().map(|t| t.name.clone()).collect();
        debug!(
            server = %service.server_name(),
            source = %source,
            tool_count = tools.len(),
            "Tool session opened"
        );
        Self {
            service,
            tools,
            tool_names,
            source,
            closed: AtomicBool::new(false),
        }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn source(&self) -> ToolSource {
        self.source
    }

    pub fn service(&self) -> Arc<dyn ToolService> {
        Arc::clone(&self.service)
    }

    /// Whether `name` was offered to the model in this request.
    pub fn knows(&self, name: &str) -> bool {
        self.tool_names.contains(name)
    }

    /// Close the connection. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.service.close().await;
        debug!(server = %self.service.server_name(), "Tool session closed");
    }
}

impl Drop for ToolSession {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let service = Arc::clone(&self.service);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(server = %service.server_name(), "Closing dropped tool session");
                handle.spawn(async move { service.close().await });
            }
            Err(_) => {
                debug!(server = %service.server_name(), "No runtime to close dropped tool session");
            }
        }
    }
}
