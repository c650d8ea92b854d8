//! Tool-use loop of one chat request
//!
//! ```text
//! AWAITING_MODEL -> STREAMING_MODEL_OUTPUT -> EXECUTING_TOOLS -> AWAITING_MODEL
//!                                         \-> DONE
//!            (any state) -> FAILED
//! ```
//!
//! Streaming and buffered requests share the loop; they differ only in how a
//! model turn is obtained and in whether events reach a client.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use fantasy_mcp::ToolConnector;
use fantasy_protocol::{
    events::{ChatStreamEvent, LoopStatus},
    messages::{CreateMessageRequest, InputMessage, SystemContent, ToolChoice},
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::{
    accumulator::{ModelTurn, ToolInvocation, TurnAccumulator},
    context::ChatSettings,
    conversation::Conversation,
    emitter::EventEmitter,
    error::ChatError,
    executor::{execute_tool, ToolResult},
    session::ToolSession,
};
use crate::{llm::ModelClient, observability::metrics::Metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Server-sent model stream, events forwarded to the client.
    Streaming,
    /// Single-object model responses, nothing emitted.
    Buffered,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Streaming => "stream",
            LoopMode::Buffered => "buffered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    StreamingModelOutput,
    ExecutingTools,
    Done,
    Failed,
}

impl LoopState {
    fn as_str(&self) -> &'static str {
        match self {
            LoopState::AwaitingModel => "AWAITING_MODEL",
            LoopState::StreamingModelOutput => "STREAMING_MODEL_OUTPUT",
            LoopState::ExecutingTools => "EXECUTING_TOOLS",
            LoopState::Done => "DONE",
            LoopState::Failed => "FAILED",
        }
    }
}

/// Result of a finished loop.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    /// Text of the final model turn.
    pub response: String,
    /// `name({json input})` per executed invocation.
    pub tool_calls: Vec<String>,
    pub tool_cycles: u32,
    pub model_calls: u32,
    pub conversation: Conversation,
}

impl LoopOutcome {
    /// History to return to the client.
    pub fn client_history(&self) -> Vec<InputMessage> {
        self.conversation.client_history(&self.response)
    }
}

/// Counters carried through the loop.
struct LoopProgress {
    tool_calls: Vec<String>,
    tool_cycles: u32,
    model_calls: u32,
    next_index: u32,
}

impl LoopProgress {
    fn new() -> Self {
        Self {
            tool_calls: Vec::new(),
            tool_cycles: 0,
            model_calls: 0,
            next_index: 0,
        }
    }

    fn finish(self, status: LoopStatus, response: String, conversation: Conversation) -> LoopOutcome {
        LoopOutcome {
            status,
            response,
            tool_calls: self.tool_calls,
            tool_cycles: self.tool_cycles,
            model_calls: self.model_calls,
            conversation,
        }
    }
}

pub struct ChatOrchestrator {
    model: Arc<dyn ModelClient>,
    settings: Arc<ChatSettings>,
    mode: LoopMode,
    emitter: EventEmitter,
    cancel: CancellationToken,
}

impl ChatOrchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        settings: Arc<ChatSettings>,
        mode: LoopMode,
        emitter: EventEmitter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            model,
            settings,
            mode,
            emitter,
            cancel,
        }
    }

    /// Run the loop to completion.
    ///
    /// The tool session is closed before the terminal event is emitted or the
    /// error returned. A cancelled run emits nothing after cancellation.
    pub async fn run(
        self,
        connector: &dyn ToolConnector,
        conversation: Conversation,
    ) -> Result<LoopOutcome, ChatError> {
        let start = Instant::now();
        let session = match ToolSession::open(
            connector,
            &self.settings.tool_server,
            self.settings.tool_list_timeout,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                error!(server = %self.settings.tool_server, error = %e, "Failed to open tool session");
                let err = ChatError::Config(format!("Tool server unavailable: {}", e));
                self.finish_failed(&err, start.elapsed()).await;
                return Err(err);
            }
        };

        let result = self.drive(&session, conversation).await;
        session.close().await;

        match &result {
            Ok(outcome) => self.finish_ok(outcome, start.elapsed()).await,
            Err(e) => self.finish_failed(e, start.elapsed()).await,
        }
        result
    }

    async fn finish_ok(self, outcome: &LoopOutcome, elapsed: Duration) {
        info!(
            status = %outcome.status.as_str(),
            model_calls = outcome.model_calls,
            tool_cycles = outcome.tool_cycles,
            duration_ms = %elapsed.as_millis(),
            "Chat loop finished"
        );
        Metrics::record_request(self.mode.as_str(), outcome.status.as_str(), elapsed);

        if outcome.status != LoopStatus::Cancelled && !self.cancel.is_cancelled() {
            self.emitter
                .emit(&ChatStreamEvent::Done {
                    status: outcome.status,
                    response: outcome.response.clone(),
                    tool_calls: outcome.tool_calls.clone(),
                    conversation_history: outcome.client_history(),
                })
                .await;
        }
        self.emitter.close();
    }

    async fn finish_failed(self, err: &ChatError, elapsed: Duration) {
        error!(
            state = %LoopState::Failed.as_str(),
            error = %err,
            duration_ms = %elapsed.as_millis(),
            "Chat loop failed"
        );
        Metrics::record_request(self.mode.as_str(), "error", elapsed);

        if !self.cancel.is_cancelled() {
            self.emitter
                .emit(&ChatStreamEvent::Error {
                    message: err.to_string(),
                })
                .await;
        }
        self.emitter.close();
    }

    async fn drive(
        &self,
        session: &ToolSession,
        mut conversation: Conversation,
    ) -> Result<LoopOutcome, ChatError> {
        let mut progress = LoopProgress::new();
        let mut state = LoopState::AwaitingModel;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(progress, conversation));
            }

            transition(&mut state, LoopState::StreamingModelOutput);
            let request = self.build_request(session, &conversation);
            progress.model_calls += 1;
            Metrics::record_model_call();

            let turn = match self.mode {
                LoopMode::Streaming => self.stream_turn(&request, &mut progress.next_index).await?,
                LoopMode::Buffered => self.buffered_turn(&request).await?,
            };
            let Some(turn) = turn else {
                return Ok(self.cancelled(progress, conversation));
            };
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(progress, conversation));
            }

            debug!(
                iteration = progress.model_calls - 1,
                stop_reason = ?turn.stop_reason,
                tool_calls = turn.invocations.len(),
                input_tokens = turn.usage.input_tokens,
                output_tokens = turn.usage.output_tokens,
                "Model turn complete"
            );
            let turn_complete = ChatStreamEvent::TurnComplete {
                iteration: progress.model_calls - 1,
                stop_reason: turn.stop_reason,
                tool_calls: turn.invocations.len(),
            };
            if !self.emit(&turn_complete).await {
                return Ok(self.cancelled(progress, conversation));
            }

            if !turn.has_tool_calls() {
                transition(&mut state, LoopState::Done);
                return Ok(progress.finish(LoopStatus::Completed, turn.text(), conversation));
            }

            if progress.tool_cycles >= self.settings.max_tool_iterations {
                warn!(
                    max_tool_iterations = self.settings.max_tool_iterations,
                    pending_tool_calls = turn.invocations.len(),
                    "Tool iteration limit reached, ending loop"
                );
                transition(&mut state, LoopState::Done);
                return Ok(progress.finish(LoopStatus::IterationLimit, turn.text(), conversation));
            }

            transition(&mut state, LoopState::ExecutingTools);
            let Some(results) = self.execute_tools(session, &turn.invocations).await else {
                return Ok(self.cancelled(progress, conversation));
            };

            progress
                .tool_calls
                .extend(turn.invocations.iter().map(ToolInvocation::summary));
            conversation.append_exchange(turn.blocks, results)?;
            progress.tool_cycles += 1;
            transition(&mut state, LoopState::AwaitingModel);
        }
    }

    fn cancelled(&self, progress: LoopProgress, conversation: Conversation) -> LoopOutcome {
        info!(
            model_calls = progress.model_calls,
            tool_cycles = progress.tool_cycles,
            "Chat loop cancelled"
        );
        progress.finish(LoopStatus::Cancelled, String::new(), conversation)
    }

    fn build_request(&self, session: &ToolSession, conversation: &Conversation) -> CreateMessageRequest {
        let tools = session.tools().to_vec();
        let has_tools = !tools.is_empty();
        CreateMessageRequest {
            model: self.settings.model.clone(),
            messages: conversation.messages().to_vec(),
            max_tokens: self.settings.max_tokens,
            stream: (self.mode == LoopMode::Streaming).then_some(true),
            system: Some(SystemContent::String(self.settings.system_prompt.clone())),
            temperature: None,
            tool_choice: has_tools.then_some(ToolChoice::Auto {
                disable_parallel_tool_use: None,
            }),
            tools: has_tools.then_some(tools),
        }
    }

    /// Emit one event unless the run is cancelled; a gone client cancels
    /// the run.
    ///
    /// A send parked on a full body channel is abandoned when cancellation
    /// arrives, so nothing is written after the token fires.
    async fn emit(&self, event: &ChatStreamEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            sent = self.emitter.emit(event) => sent,
        };
        if !sent {
            self.cancel.cancel();
        }
        sent
    }

    /// Resolves when the run should stop: explicit cancel or client gone.
    async fn interrupted(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.emitter.closed() => {
                debug!("Client disconnected");
                self.cancel.cancel();
            }
        }
    }

    /// Consume one streamed model turn. `None` when interrupted.
    async fn stream_turn(
        &self,
        request: &CreateMessageRequest,
        next_index: &mut u32,
    ) -> Result<Option<ModelTurn>, ChatError> {
        let mut stream = tokio::select! {
            biased;
            _ = self.interrupted() => return Ok(None),
            result = self.model.stream_message(request) => result?,
        };

        let mut accumulator = TurnAccumulator::new(*next_index);
        loop {
            let item = tokio::select! {
                biased;
                _ = self.interrupted() => return Ok(None),
                item = stream.next() => item,
            };

            match item {
                Some(Ok(event)) => {
                    for out in accumulator.apply(event)? {
                        if !self.emit(&out).await {
                            return Ok(None);
                        }
                    }
                    if accumulator.is_stopped() {
                        break;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        *next_index = accumulator.next_index();
        accumulator.finish().map(Some)
    }

    async fn buffered_turn(
        &self,
        request: &CreateMessageRequest,
    ) -> Result<Option<ModelTurn>, ChatError> {
        let message = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(None),
            result = self.model.create_message(request) => result?,
        };
        Ok(Some(ModelTurn::from_message(&message)))
    }

    /// Execute invocations in model order. `None` when interrupted.
    async fn execute_tools(
        &self,
        session: &ToolSession,
        invocations: &[ToolInvocation],
    ) -> Option<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(invocations.len());

        for invocation in invocations {
            if self.cancel.is_cancelled() {
                debug!(tool = %invocation.name, "Skipping tool call after cancellation");
                return None;
            }

            let start = ChatStreamEvent::ToolExecutionStart {
                id: invocation.id.clone(),
                name: invocation.name.clone(),
                input: invocation.input_value(),
            };
            if !self.emit(&start).await {
                return None;
            }
            info!(tool = %invocation.name, tool_use_id = %invocation.id, "Executing tool");

            let result = if session.knows(&invocation.name) {
                let service = session.service();
                let task_invocation = invocation.clone();
                let handle = tokio::spawn(
                    async move { execute_tool(service.as_ref(), &task_invocation).await }
                        .in_current_span(),
                );

                tokio::select! {
                    biased;
                    _ = self.interrupted() => {
                        debug!(tool = %invocation.name, "Detaching in-flight tool call");
                        return None;
                    }
                    joined = handle => match joined {
                        Ok(result) => result,
                        Err(e) => {
                            Metrics::record_tool_call(&invocation.name, false);
                            ToolResult::failure(&invocation.id, &invocation.name, format!("tool task failed: {}", e))
                        }
                    },
                }
            } else {
                warn!(tool = %invocation.name, "Model requested a tool that was not offered");
                Metrics::record_tool_call(&invocation.name, false);
                ToolResult::failure(
                    &invocation.id,
                    &invocation.name,
                    format!("Unknown tool: {}", invocation.name),
                )
            };

            let outcome = if result.is_error {
                ChatStreamEvent::ToolExecutionError {
                    id: invocation.id.clone(),
                    name: invocation.name.clone(),
                    error: result.content.clone(),
                }
            } else {
                ChatStreamEvent::ToolExecutionComplete {
                    id: invocation.id.clone(),
                    name: invocation.name.clone(),
                    content: result.content.clone(),
                }
            };
            if !self.emit(&outcome).await {
                return None;
            }
            results.push(result);
        }

        Some(results)
    }
}

fn transition(state: &mut LoopState, next: LoopState) {
    info!(from = %state.as_str(), to = %next.as_str(), "Chat loop transition");
    *state = next;
}
