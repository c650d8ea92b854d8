//! HTTP routes of the gateway.

pub mod chat;
pub mod error;
pub mod mcp_proxy;
