//! Chat API request and response types.
//!
//! `POST /api/chat` accepts a user message plus the prior conversation the
//! client chose to keep, and answers either with a [`ChatResponse`] or with a
//! stream of [`crate::events::ChatStreamEvent`] records.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    messages::{InputMessage, Role},
    validated::Normalizable,
};

/// Inbound chat request.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_chat_request"))]
pub struct ChatRequest {
    /// The new user message.
    #[serde(default)]
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,

    /// Prior turns, oldest first.
    #[serde(default)]
    pub conversation_history: Vec<InputMessage>,

    /// Stream lifecycle events instead of returning a single JSON object.
    pub stream: Option<bool>,
}

impl Normalizable for ChatRequest {
    fn normalize(&mut self) {
        if self.message.trim().is_empty() {
            self.message.clear();
        }
    }
}

impl ChatRequest {
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

fn validate_chat_request(req: &ChatRequest) -> Result<(), validator::ValidationError> {
    validate_history(&req.conversation_history).map_err(|msg| {
        let mut e = validator::ValidationError::new("invalid_conversation_history");
        e.message = Some(msg.into());
        e
    })
}

/// Check that prior history can be continued with a new user message.
///
/// The history must start with a user turn, alternate roles, and end with an
/// assistant turn. An empty history is valid.
pub fn validate_history(history: &[InputMessage]) -> Result<(), String> {
    let Some(first) = history.first() else {
        return Ok(());
    };
    if first.role != Role::User {
        return Err("conversationHistory must start with a user message".to_string());
    }

    for (i, pair) in history.windows(2).enumerate() {
        if pair[0].role == pair[1].role {
            return Err(format!(
                "conversationHistory roles must alternate, found consecutive '{}' messages at position {}",
                pair[1].role.as_str(),
                i + 1
            ));
        }
    }

    match history.last() {
        Some(last) if last.role == Role::User => {
            Err("conversationHistory must end with an assistant message".to_string())
        }
        _ => Ok(()),
    }
}

/// Non-streaming chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Final assistant text.
    pub response: String,

    /// One `name({json input})` summary per executed tool call.
    pub tool_calls: Vec<String>,

    pub success: bool,

    /// History to send back on the next request.
    pub conversation_history: Vec<InputMessage>,
}
