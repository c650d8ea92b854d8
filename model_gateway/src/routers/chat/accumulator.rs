//! Per-turn accumulation of a streamed model response
//!
//! A [`TurnAccumulator`] consumes the decoded upstream events of one model
//! call, produces the client-facing [`ChatStreamEvent`]s for them, and on
//! `message_stop` yields the completed [`ModelTurn`]. Block indices are
//! offset by `index_base` so they stay monotonic across turns.

use fantasy_protocol::{
    events::ChatStreamEvent,
    messages::{
        ContentBlock, ContentBlockDelta, InputContentBlock, Message, MessageStreamEvent,
        StopReason, TextBlock, ToolUseBlock, Usage,
    },
};
use serde_json::{json, Value};
use tracing::debug;

use super::error::ChatError;
use crate::llm::LlmError;

/// Maximum upstream content block index accepted from a model turn.
const MAX_UPSTREAM_BLOCK_INDEX: u32 = 1024;

/// Maximum bytes accumulated across all blocks of a single turn (10 MB).
const MAX_BLOCK_ACCUMULATION_SIZE: usize = 10 * 1024 * 1024;

// ============================================================================
// Turn results
// ============================================================================

/// One tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or the parse failure for malformed argument JSON.
    pub input: Result<Value, String>,
}

impl ToolInvocation {
    /// Arguments as recorded in the conversation; `{}` when malformed.
    pub fn input_value(&self) -> Value {
        self.input.clone().unwrap_or_else(|_| json!({}))
    }

    /// `name({json input})`, as reported to the client.
    pub fn summary(&self) -> String {
        format!("{}({})", self.name, self.input_value())
    }

    fn to_block(&self) -> InputContentBlock {
        InputContentBlock::ToolUse(ToolUseBlock {
            id: self.id.clone(),
            name: self.name.clone(),
            input: self.input_value(),
            cache_control: None,
        })
    }
}

/// A completed model turn.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Assistant content in emission order: non-empty text and tool_use blocks.
    pub blocks: Vec<InputContentBlock>,
    pub invocations: Vec<ToolInvocation>,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl ModelTurn {
    /// Build a turn from a non-streaming response.
    pub fn from_message(message: &Message) -> Self {
        let mut turn = ModelTurn {
            stop_reason: message.stop_reason,
            usage: message.usage.clone(),
            ..Default::default()
        };

        for block in &message.content {
            match block {
                ContentBlock::Text { text, .. } if !text.is_empty() => {
                    turn.blocks.push(InputContentBlock::Text(TextBlock::new(text.clone())));
                }
                ContentBlock::ToolUse { id, name, input } => {
                    let invocation = ToolInvocation {
                        id: id.clone(),
                        name: name.clone(),
                        input: Ok(input.clone()),
                    };
                    turn.blocks.push(invocation.to_block());
                    turn.invocations.push(invocation);
                }
                _ => {}
            }
        }

        turn
    }

    /// Text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                InputContentBlock::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.invocations.is_empty()
    }
}

// ============================================================================
// Block accumulation
// ============================================================================

#[derive(Debug)]
enum BlockAccumulator {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        initial_input: Value,
        input_json: String,
        invocation: Option<ToolInvocation>,
    },
    /// Blocks the loop does not act on (thinking, server tools, ...).
    Ignored,
}

impl BlockAccumulator {
    fn for_block(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text, .. } => BlockAccumulator::Text { text: text.clone() },
            ContentBlock::ToolUse { id, name, input } => BlockAccumulator::ToolUse {
                id: id.clone(),
                name: name.clone(),
                initial_input: input.clone(),
                input_json: String::new(),
                invocation: None,
            },
            _ => BlockAccumulator::Ignored,
        }
    }
}

fn parse_tool_input(input_json: &str, initial_input: &Value) -> Result<Value, String> {
    if input_json.trim().is_empty() {
        return Ok(match initial_input {
            Value::Object(map) if !map.is_empty() => initial_input.clone(),
            _ => json!({}),
        });
    }
    serde_json::from_str(input_json).map_err(|e| format!("Invalid tool input JSON: {}", e))
}

// ============================================================================
// Turn accumulator
// ============================================================================

pub struct TurnAccumulator {
    index_base: u32,
    blocks: Vec<Option<BlockAccumulator>>,
    stop_reason: Option<StopReason>,
    usage: Usage,
    accumulated: usize,
    stopped: bool,
}

impl TurnAccumulator {
    pub fn new(index_base: u32) -> Self {
        Self {
            index_base,
            blocks: Vec::new(),
            stop_reason: None,
            usage: Usage::default(),
            accumulated: 0,
            stopped: false,
        }
    }

    /// First client index free for the next turn.
    pub fn next_index(&self) -> u32 {
        self.index_base + self.blocks.len() as u32
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Apply one upstream event and return the client events it produces.
    pub fn apply(&mut self, event: MessageStreamEvent) -> Result<Vec<ChatStreamEvent>, ChatError> {
        if self.stopped {
            debug!("Ignoring model event after message_stop");
            return Ok(Vec::new());
        }

        match event {
            MessageStreamEvent::MessageStart { message } => {
                self.usage = message.usage;
                Ok(Vec::new())
            }
            MessageStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => self.handle_block_start(index, &content_block),
            MessageStreamEvent::ContentBlockDelta { index, delta } => {
                self.handle_block_delta(index, delta)
            }
            MessageStreamEvent::ContentBlockStop { index } => self.handle_block_stop(index),
            MessageStreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    self.usage.output_tokens = usage.output_tokens;
                    if let Some(input_tokens) = usage.input_tokens {
                        self.usage.input_tokens = input_tokens;
                    }
                }
                Ok(Vec::new())
            }
            MessageStreamEvent::MessageStop => {
                self.stopped = true;
                Ok(Vec::new())
            }
            MessageStreamEvent::Ping | MessageStreamEvent::Unknown => Ok(Vec::new()),
            MessageStreamEvent::Error { error } => Err(ChatError::Model(LlmError::Upstream {
                error_type: error.error_type,
                message: error.message,
            })),
        }
    }

    /// Complete the turn. Fails if the stream ended before `message_stop`.
    pub fn finish(self) -> Result<ModelTurn, ChatError> {
        if !self.stopped {
            return Err(ChatError::Stream(
                "model stream ended before message_stop".to_string(),
            ));
        }

        let mut turn = ModelTurn {
            stop_reason: self.stop_reason,
            usage: self.usage,
            ..Default::default()
        };

        for block in self.blocks.into_iter().flatten() {
            match block {
                BlockAccumulator::Text { text } if !text.is_empty() => {
                    turn.blocks.push(InputContentBlock::Text(TextBlock::new(text)));
                }
                BlockAccumulator::ToolUse {
                    id,
                    name,
                    initial_input,
                    input_json,
                    invocation,
                } => {
                    let invocation = invocation.unwrap_or_else(|| ToolInvocation {
                        input: parse_tool_input(&input_json, &initial_input),
                        id,
                        name,
                    });
                    turn.blocks.push(invocation.to_block());
                    turn.invocations.push(invocation);
                }
                _ => {}
            }
        }

        Ok(turn)
    }

    fn handle_block_start(
        &mut self,
        index: u32,
        content_block: &ContentBlock,
    ) -> Result<Vec<ChatStreamEvent>, ChatError> {
        if index > MAX_UPSTREAM_BLOCK_INDEX {
            return Err(ChatError::Stream(format!(
                "content block index {} exceeds maximum {}",
                index, MAX_UPSTREAM_BLOCK_INDEX
            )));
        }

        let slot = index as usize;
        if self.blocks.len() <= slot {
            self.blocks.resize_with(slot + 1, || None);
        }
        if self.blocks[slot].is_some() {
            return Err(ChatError::Stream(format!(
                "content block {} started twice",
                index
            )));
        }

        let client_index = self.index_base + index;
        let accumulator = BlockAccumulator::for_block(content_block);
        let events = match &accumulator {
            BlockAccumulator::Text { text } => {
                self.accumulated += text.len();
                let mut events = vec![ChatStreamEvent::TextStart {
                    index: client_index,
                }];
                if !text.is_empty() {
                    events.push(ChatStreamEvent::TextDelta {
                        index: client_index,
                        text: text.clone(),
                    });
                }
                events
            }
            BlockAccumulator::ToolUse { id, name, .. } => vec![ChatStreamEvent::ToolUseStart {
                index: client_index,
                id: id.clone(),
                name: name.clone(),
            }],
            BlockAccumulator::Ignored => Vec::new(),
        };

        self.blocks[slot] = Some(accumulator);
        self.check_accumulation()?;
        Ok(events)
    }

    fn handle_block_delta(
        &mut self,
        index: u32,
        delta: ContentBlockDelta,
    ) -> Result<Vec<ChatStreamEvent>, ChatError> {
        let client_index = self.index_base + index;
        let block = self.block_mut(index)?;

        let event = match (block, delta) {
            (BlockAccumulator::Text { text }, ContentBlockDelta::TextDelta { text: fragment }) => {
                text.push_str(&fragment);
                Some((
                    fragment.len(),
                    ChatStreamEvent::TextDelta {
                        index: client_index,
                        text: fragment,
                    },
                ))
            }
            (
                BlockAccumulator::ToolUse { id, input_json, .. },
                ContentBlockDelta::InputJsonDelta { partial_json },
            ) => {
                input_json.push_str(&partial_json);
                Some((
                    partial_json.len(),
                    ChatStreamEvent::ToolInputDelta {
                        index: client_index,
                        id: id.clone(),
                        partial_json,
                    },
                ))
            }
            _ => None,
        };

        match event {
            Some((len, event)) => {
                self.accumulated += len;
                self.check_accumulation()?;
                Ok(vec![event])
            }
            None => Ok(Vec::new()),
        }
    }

    fn handle_block_stop(&mut self, index: u32) -> Result<Vec<ChatStreamEvent>, ChatError> {
        let client_index = self.index_base + index;
        let block = self.block_mut(index)?;

        match block {
            BlockAccumulator::Text { .. } => Ok(vec![ChatStreamEvent::TextStop {
                index: client_index,
            }]),
            BlockAccumulator::ToolUse {
                id,
                name,
                initial_input,
                input_json,
                invocation,
            } => {
                let parsed = ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    input: parse_tool_input(input_json, initial_input),
                };
                if let Err(e) = &parsed.input {
                    debug!(tool = %name, error = %e, "Model produced malformed tool input");
                }
                let event = ChatStreamEvent::ToolUseStop {
                    index: client_index,
                    id: parsed.id.clone(),
                    name: parsed.name.clone(),
                    input: parsed.input_value(),
                };
                *invocation = Some(parsed);
                Ok(vec![event])
            }
            BlockAccumulator::Ignored => Ok(Vec::new()),
        }
    }

    fn block_mut(&mut self, index: u32) -> Result<&mut BlockAccumulator, ChatError> {
        self.blocks
            .get_mut(index as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| ChatError::Stream(format!("event for unknown content block {}", index)))
    }

    fn check_accumulation(&self) -> Result<(), ChatError> {
        if self.accumulated > MAX_BLOCK_ACCUMULATION_SIZE {
            return Err(ChatError::Stream(format!(
                "model turn exceeded maximum accumulated size ({} bytes)",
                MAX_BLOCK_ACCUMULATION_SIZE
            )));
        }
        Ok(())
    }
}
