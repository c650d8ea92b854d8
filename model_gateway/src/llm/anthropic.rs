//! HTTP transport for the Anthropic Messages API
//!
//! Builds `/v1/messages` requests, sends them, and turns non-success
//! responses into [`LlmError::Api`] with the provider's error message.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use fantasy_protocol::messages::{CreateMessageRequest, ErrorEnvelope, Message};
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{sse::decode_event_stream, LlmError, ModelClient, ModelEventStream};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum error response body size to prevent DoS (1 MB)
const MAX_ERROR_RESPONSE_SIZE: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AnthropicClient {
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn request_builder(&self, request: &CreateMessageRequest) -> reqwest::RequestBuilder {
        self.http_client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        model: &str,
    ) -> Result<reqwest::Response, LlmError> {
        let url = self.messages_url();
        debug!(url = %url, model = %model, "Sending request to model provider");

        let response = builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request to model provider failed");
            LlmError::Request(e)
        })?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, model).await);
        }

        debug!(url = %url, status = %response.status(), "Received response from model provider");
        Ok(response)
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn create_message(&self, request: &CreateMessageRequest) -> Result<Message, LlmError> {
        let start_time = Instant::now();
        let builder = self.request_builder(request).timeout(self.request_timeout);
        let response = self.send(builder, &request.model).await?;

        let message = response
            .json::<Message>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        info!(
            model = %request.model,
            message_id = %message.id,
            input_tokens = %message.usage.input_tokens,
            output_tokens = %message.usage.output_tokens,
            duration_ms = %start_time.elapsed().as_millis(),
            "Completed non-streaming model call"
        );
        Ok(message)
    }

    async fn stream_message(
        &self,
        request: &CreateMessageRequest,
    ) -> Result<ModelEventStream, LlmError> {
        // No overall timeout: a streamed turn lasts as long as the model keeps
        // producing, and the caller cancels when the client goes away.
        let builder = self.request_builder(request);
        let response = self.send(builder, &request.model).await?;
        debug!(model = %request.model, "Model stream opened");
        Ok(decode_event_stream(response.bytes_stream()))
    }
}

/// Read a non-success body (size limited) and extract the provider message.
async fn handle_error_response(response: reqwest::Response, model: &str) -> LlmError {
    let status = response.status();

    let message = match read_response_body_limited(response, MAX_ERROR_RESPONSE_SIZE).await {
        ReadBodyResult::Ok(body) => extract_error_message(&body)
            .unwrap_or_else(|| format!("Model provider returned error: {}", status)),
        ReadBodyResult::TooLarge => {
            warn!(
                model = %model,
                max_size = %MAX_ERROR_RESPONSE_SIZE,
                "Error response body too large"
            );
            format!(
                "Model provider returned error: {} (response too large)",
                status
            )
        }
        ReadBodyResult::Error(e) => {
            warn!(model = %model, error = %e, "Failed to read error response body");
            format!("Model provider returned error: {}", status)
        }
    };

    warn!(
        model = %model,
        status = %status,
        message_preview = %message.chars().take(200).collect::<String>(),
        "Model provider error"
    );

    LlmError::Api {
        status: status.as_u16(),
        message,
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Some(envelope.error.message),
        Err(_) => Some(body.to_string()),
    }
}

enum ReadBodyResult {
    Ok(String),
    TooLarge,
    Error(String),
}

async fn read_response_body_limited(response: reqwest::Response, max_size: usize) -> ReadBodyResult {
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk_result) = stream.next().await {
        match chunk_result {
            Ok(chunk) => {
                if buf.len() + chunk.len() > max_size {
                    return ReadBodyResult::TooLarge;
                }
                buf.extend_from_slice(&chunk);
            }
            Err(e) => return ReadBodyResult::Error(e.to_string()),
        }
    }

    match String::from_utf8(buf) {
        Ok(body) => ReadBodyResult::Ok(body),
        Err(e) => ReadBodyResult::Error(format!("invalid UTF-8 in response body: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_from_envelope() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("Overloaded"));
    }

    #[test]
    fn test_extract_error_message_falls_back_to_raw_body() {
        assert_eq!(
            extract_error_message("upstream exploded").as_deref(),
            Some("upstream exploded")
        );
        assert!(extract_error_message("   ").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AnthropicClient::new(
            reqwest::Client::new(),
            "https://api.anthropic.com/",
            "sk-test",
            Duration::from_secs(60),
        );
        assert_eq!(client.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = AnthropicClient::new(
            reqwest::Client::new(),
            "https://api.anthropic.com",
            "sk-secret",
            Duration::from_secs(60),
        );
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
