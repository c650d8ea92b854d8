//! Conversation state replayed on every model call.

use std::collections::HashMap;

use fantasy_protocol::messages::{InputContent, InputContentBlock, InputMessage, Role};

use super::{error::ChatError, executor::ToolResult};

/// Stands in for an empty final response in returned history. The provider
/// rejects empty text content, so the client could not resend it.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(No response text was produced for this request.)";

/// Append-only message list for one request.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<InputMessage>,
    seed_len: usize,
    exchanges: usize,
}

impl Conversation {
    /// Seed with the caller's prior history plus the new user message.
    pub fn new(history: Vec<InputMessage>, message: impl Into<String>) -> Self {
        let mut messages = history;
        messages.push(InputMessage::user(message));
        Self {
            seed_len: messages.len(),
            messages,
            exchanges: 0,
        }
    }

    pub fn messages(&self) -> &[InputMessage] {
        &self.messages
    }

    /// Prior history plus the new user message, without tool exchanges.
    pub fn seed(&self) -> &[InputMessage] {
        &self.messages[..self.seed_len]
    }

    /// History handed back to the client: the seed plus the final
    /// assistant text. Tool exchanges stay server-side.
    ///
    /// A blank response is replaced with [`EMPTY_RESPONSE_PLACEHOLDER`] so
    /// roles keep alternating and the history stays valid to resend.
    pub fn client_history(&self, response: &str) -> Vec<InputMessage> {
        let mut history = self.seed().to_vec();
        if response.trim().is_empty() {
            history.push(InputMessage::assistant(EMPTY_RESPONSE_PLACEHOLDER));
        } else {
            history.push(InputMessage::assistant(response));
        }
        history
    }

    /// Number of tool exchanges appended so far.
    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    /// Append an assistant turn and the tool-result turn answering it.
    ///
    /// The result ids must match the assistant turn's tool_use ids exactly.
    /// Results are written in tool_use order.
    pub fn append_exchange(
        &mut self,
        assistant_blocks: Vec<InputContentBlock>,
        results: Vec<ToolResult>,
    ) -> Result<(), ChatError> {
        let assistant = InputMessage {
            role: Role::Assistant,
            content: InputContent::Blocks(assistant_blocks),
        };

        let tool_use_ids = assistant.tool_use_ids();
        if tool_use_ids.is_empty() {
            return Err(ChatError::Conversation(
                "assistant turn has no tool_use blocks".to_string(),
            ));
        }

        let mut by_id: HashMap<String, ToolResult> = HashMap::with_capacity(results.len());
        for result in results {
            if by_id.contains_key(&result.tool_use_id) {
                return Err(ChatError::Conversation(format!(
                    "duplicate tool result for {}",
                    result.tool_use_id
                )));
            }
            by_id.insert(result.tool_use_id.clone(), result);
        }

        let mut result_blocks = Vec::with_capacity(tool_use_ids.len());
        for id in &tool_use_ids {
            let result = by_id.remove(*id).ok_or_else(|| {
                ChatError::Conversation(format!("missing tool result for {}", id))
            })?;
            result_blocks.push(result.into_block());
        }
        if let Some(extra) = by_id.keys().next() {
            return Err(ChatError::Conversation(format!(
                "tool result {} has no matching tool_use",
                extra
            )));
        }

        self.messages.push(assistant);
        self.messages.push(InputMessage {
            role: Role::User,
            content: InputContent::Blocks(result_blocks),
        });
        self.exchanges += 1;
        Ok(())
    }
}
