//! Model provider client.
//!
//! [`ModelClient`] is the seam between the chat orchestrator and the LLM
//! provider. [`anthropic::AnthropicClient`] implements it over HTTP; tests
//! substitute scripted clients.

pub mod anthropic;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use fantasy_protocol::messages::{CreateMessageRequest, Message, MessageStreamEvent};
use futures::Stream;
use thiserror::Error;

pub use anthropic::AnthropicClient;

/// Decoded upstream events, in arrival order.
pub type ModelEventStream =
    Pin<Box<dyn Stream<Item = Result<MessageStreamEvent, LlmError>> + Send>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request to model provider failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from model provider: {0}")]
    Decode(String),

    #[error("Model stream error: {0}")]
    Stream(String),

    #[error("Model provider reported {error_type}: {message}")]
    Upstream { error_type: String, message: String },
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Single request/response call. `request.stream` must be unset or false.
    async fn create_message(&self, request: &CreateMessageRequest) -> Result<Message, LlmError>;

    /// Server-sent event call. `request.stream` must be true.
    async fn stream_message(
        &self,
        request: &CreateMessageRequest,
    ) -> Result<ModelEventStream, LlmError>;
}
