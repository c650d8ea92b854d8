//! `POST /api/chat`
//!
//! Validates the request, then runs the tool loop either behind a streamed
//! body (`stream: true`) or to completion under the request timeout.

use std::{io, sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use fantasy_protocol::{
    chat::{ChatRequest, ChatResponse},
    validated::ValidatedJson,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{
    context::ChatContext,
    conversation::Conversation,
    emitter::EventEmitter,
    error::ChatError,
    orchestrator::{ChatOrchestrator, LoopMode},
};
use crate::{llm::ModelClient, observability::metrics::Metrics};

/// Channel buffer size for events sent to the client.
const STREAM_CHANNEL_SIZE: usize = 128;

const MISSING_API_KEY: &str = "Anthropic API key not configured";

pub async fn chat(
    State(ctx): State<ChatContext>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Response {
    let request_id = Uuid::new_v4();
    let stream = request.is_stream();
    let span = info_span!("chat", %request_id, stream);

    async move {
        let Some(model) = ctx.model_client.clone() else {
            warn!("Chat request rejected: {}", MISSING_API_KEY);
            return ChatError::Config(MISSING_API_KEY.to_string()).into_response();
        };

        info!(
            history_len = request.conversation_history.len(),
            "Chat request received"
        );
        let conversation = Conversation::new(request.conversation_history, request.message);

        if stream {
            stream_chat(ctx, model, conversation)
        } else {
            buffered_chat(ctx, model, conversation).await
        }
    }
    .instrument(span)
    .await
}

/// Spawn the loop and return its events as a streamed body.
fn stream_chat(ctx: ChatContext, model: Arc<dyn ModelClient>, conversation: Conversation) -> Response {
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(STREAM_CHANNEL_SIZE);
    let orchestrator = ChatOrchestrator::new(
        model,
        Arc::clone(&ctx.settings),
        LoopMode::Streaming,
        EventEmitter::new(tx),
        CancellationToken::new(),
    );

    tokio::spawn(
        async move {
            // Terminal events are emitted by the orchestrator itself.
            let _ = orchestrator
                .run(ctx.tool_connector.as_ref(), conversation)
                .await;
        }
        .in_current_span(),
    );

    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    response
}

/// Run the loop to completion under the request timeout.
async fn buffered_chat(
    ctx: ChatContext,
    model: Arc<dyn ModelClient>,
    conversation: Conversation,
) -> Response {
    let start = Instant::now();
    let timeout = ctx.settings.request_timeout;
    let orchestrator = ChatOrchestrator::new(
        model,
        Arc::clone(&ctx.settings),
        LoopMode::Buffered,
        EventEmitter::disabled(),
        CancellationToken::new(),
    );

    let run = orchestrator.run(ctx.tool_connector.as_ref(), conversation);
    match tokio::time::timeout(timeout, run).await {
        Ok(Ok(outcome)) => {
            let conversation_history = outcome.client_history();
            Json(ChatResponse {
                response: outcome.response,
                tool_calls: outcome.tool_calls,
                success: true,
                conversation_history,
            })
            .into_response()
        }
        Ok(Err(e)) => e.into_response(),
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Chat request timed out");
            Metrics::record_request(LoopMode::Buffered.as_str(), "timeout", start.elapsed());
            ChatError::Timeout(timeout.as_secs()).into_response()
        }
    }
}
