//! Model Context Protocol (MCP) client implementation.
//!
//! ## Modules
//!
//! - [`core`]: streamable HTTP client, server configuration, and the
//!   [`ToolService`] / [`ToolConnector`] seams used by the chat gateway
//! - [`error`]: error types

pub mod core;
pub mod error;

pub use core::{config, service};
pub use core::{
    McpClient, McpConfig, McpConnector, McpServerConfig, McpTool, ToolCallOutput, ToolConnector,
    ToolService, CLIENT_NAME, MCP_ENDPOINT_PATH,
};
pub use error::{McpError, McpResult};
