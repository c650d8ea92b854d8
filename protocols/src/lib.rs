//! Protocol definitions shared by the fantasy chat gateway crates.
//!
//! - [`messages`]: the subset of the Anthropic Messages API the gateway speaks upstream
//! - [`chat`]: the inbound chat API (request, response, history rules)
//! - [`events`]: events streamed back to chat clients
//! - [`proxy`]: the MCP proxy endpoint bodies
//! - [`validated`]: `ValidatedJson` extractor (behind the `axum` feature)

pub mod chat;
pub mod events;
pub mod messages;
pub mod proxy;
pub mod validated;
