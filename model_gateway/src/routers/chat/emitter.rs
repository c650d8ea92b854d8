//! Outbound event stream of a chat request.

use std::io;

use bytes::Bytes;
use fantasy_protocol::events::ChatStreamEvent;
use tokio::sync::mpsc;
use tracing::debug;

pub type BodySender = mpsc::Sender<Result<Bytes, io::Error>>;

/// Writes [`ChatStreamEvent`]s into the response body channel.
///
/// Owns the only sender: the body ends when the emitter is closed or dropped.
/// A disabled emitter discards everything.
pub struct EventEmitter {
    tx: Option<BodySender>,
}

impl EventEmitter {
    pub fn new(tx: BodySender) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Send one event. Returns `false` if the client is gone.
    pub async fn emit(&self, event: &ChatStreamEvent) -> bool {
        let Some(tx) = &self.tx else {
            return true;
        };
        if tx.send(Ok(format_event(event))).await.is_err() {
            debug!(event_type = %event.event_type(), "Client disconnected, dropping event");
            return false;
        }
        true
    }

    /// Resolves once the client has disconnected. Never resolves when
    /// disabled.
    pub async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }

    /// End the body stream.
    pub fn close(self) {}
}

/// Format an event as one `data: <json>\n\n` record.
pub fn format_event(event: &ChatStreamEvent) -> Bytes {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("data: {}\n\n", json))
}
