//! Events streamed to chat clients.
//!
//! Each event is written as one `data: <json>\n\n` record. The `type` field
//! discriminates the variant; block `index` values are monotonic across all
//! model turns of a request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::{InputMessage, StopReason};

/// How a tool loop ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    /// The model finished without requesting more tools.
    Completed,
    /// The tool-iteration cap was reached; the response holds partial content.
    IterationLimit,
    /// The caller went away or cancelled the request.
    Cancelled,
}

impl LoopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStatus::Completed => "completed",
            LoopStatus::IterationLimit => "iteration_limit",
            LoopStatus::Cancelled => "cancelled",
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    TextStart {
        index: u32,
    },
    TextDelta {
        index: u32,
        text: String,
    },
    TextStop {
        index: u32,
    },
    ToolUseStart {
        index: u32,
        id: String,
        name: String,
    },
    ToolInputDelta {
        index: u32,
        id: String,
        partial_json: String,
    },
    ToolUseStop {
        index: u32,
        id: String,
        name: String,
        input: Value,
    },
    ToolExecutionStart {
        id: String,
        name: String,
        input: Value,
    },
    ToolExecutionComplete {
        id: String,
        name: String,
        content: String,
    },
    ToolExecutionError {
        id: String,
        name: String,
        error: String,
    },
    TurnComplete {
        iteration: u32,
        stop_reason: Option<StopReason>,
        tool_calls: usize,
    },
    Done {
        status: LoopStatus,
        response: String,
        tool_calls: Vec<String>,
        conversation_history: Vec<InputMessage>,
    },
    Error {
        message: String,
    },
}

impl ChatStreamEvent {
    /// Wire name of the event, as written in the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatStreamEvent::TextStart { .. } => "text_start",
            ChatStreamEvent::TextDelta { .. } => "text_delta",
            ChatStreamEvent::TextStop { .. } => "text_stop",
            ChatStreamEvent::ToolUseStart { .. } => "tool_use_start",
            ChatStreamEvent::ToolInputDelta { .. } => "tool_input_delta",
            ChatStreamEvent::ToolUseStop { .. } => "tool_use_stop",
            ChatStreamEvent::ToolExecutionStart { .. } => "tool_execution_start",
            ChatStreamEvent::ToolExecutionComplete { .. } => "tool_execution_complete",
            ChatStreamEvent::ToolExecutionError { .. } => "tool_execution_error",
            ChatStreamEvent::TurnComplete { .. } => "turn_complete",
            ChatStreamEvent::Done { .. } => "done",
            ChatStreamEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatStreamEvent::Done { .. } | ChatStreamEvent::Error { .. }
        )
    }
}
