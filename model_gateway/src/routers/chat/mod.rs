//! Chat endpoint and its tool-use loop
//!
//! - [`handler`]: `POST /api/chat`, streaming and buffered
//! - [`orchestrator`]: the loop state machine
//! - [`accumulator`]: per-turn assembly of streamed model output
//! - [`conversation`]: message history replayed to the model
//! - [`session`], [`registry`], [`executor`]: MCP tool access for one request
//! - [`emitter`]: outbound `data: <json>` records

pub mod accumulator;
pub mod context;
pub mod conversation;
pub mod emitter;
pub mod error;
pub mod executor;
pub mod handler;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod session;

pub use context::{ChatContext, ChatSettings};
pub use error::ChatError;
pub use orchestrator::{ChatOrchestrator, LoopMode, LoopOutcome};
