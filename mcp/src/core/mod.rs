//! Core MCP client infrastructure.

pub mod client;
pub mod config;
pub mod connector;
pub mod service;

pub use client::{McpClient, CLIENT_NAME};
pub use config::{McpConfig, McpServerConfig, MCP_ENDPOINT_PATH};
pub use connector::McpConnector;
pub use service::{McpTool, ToolCallOutput, ToolConnector, ToolService};
