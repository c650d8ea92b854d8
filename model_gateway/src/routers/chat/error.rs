use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::{llm::LlmError, routers::error};

/// Unrecoverable failures of a chat request.
///
/// Tool failures are not here: they become error-flagged tool results and
/// the loop continues.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("Malformed model stream: {0}")]
    Stream(String),

    #[error("Conversation state error: {0}")]
    Conversation(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl ChatError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ChatError::Config(_) => "config_error",
            ChatError::Model(LlmError::Api { .. }) => "model_api_error",
            ChatError::Model(LlmError::Upstream { .. }) => "model_upstream_error",
            ChatError::Model(_) => "model_error",
            ChatError::Stream(_) => "stream_error",
            ChatError::Conversation(_) => "conversation_error",
            ChatError::Timeout(_) => "timeout",
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        match &self {
            ChatError::Config(msg) => error::internal_error(self.error_code(), msg.clone()),
            ChatError::Timeout(_) => error::request_timeout(self.error_code(), self.to_string()),
            _ => error::internal_error(
                self.error_code(),
                format!("Chat processing failed: {}", self),
            ),
        }
    }
}
