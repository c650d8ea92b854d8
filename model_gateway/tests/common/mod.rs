//! Shared fixtures for HTTP-level tests: a scripted model, an in-memory MCP
//! server and helpers to drive the router with `oneshot`.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use fantasy_gateway::{
    llm::{LlmError, ModelClient, ModelEventStream},
    routers::chat::{prompt::DEFAULT_SYSTEM_PROMPT, ChatContext, ChatSettings},
    server::build_app,
};
use fantasy_mcp::{
    McpError, McpResult, McpTool, ToolCallOutput, ToolConnector, ToolService,
};
use fantasy_protocol::messages::{
    ContentBlock, ContentBlockDelta, CreateMessageRequest, Message, MessageDelta,
    MessageStreamEvent, StopReason, Usage,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

// ----------------------------------------------------------------------
// Scripted model
// ----------------------------------------------------------------------

/// One scripted model turn.
#[derive(Clone)]
pub enum Reply {
    Text(String),
    /// `(id, name, input)` tool calls.
    Tools(Vec<(String, String, Value)>),
    /// Never answers.
    Hang,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }

    pub fn tool(id: &str, name: &str, input: Value) -> Self {
        Reply::Tools(vec![(id.to_string(), name.to_string(), input)])
    }

    fn content(&self) -> Vec<ContentBlock> {
        match self {
            Reply::Text(text) => vec![ContentBlock::Text {
                text: text.clone(),
                citations: None,
            }],
            Reply::Tools(calls) => calls
                .iter()
                .map(|(id, name, input)| ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                })
                .collect(),
            Reply::Hang => Vec::new(),
        }
    }

    fn stop_reason(&self) -> StopReason {
        match self {
            Reply::Tools(_) => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        }
    }

    fn message(&self) -> Message {
        Message {
            id: "msg_test".to_string(),
            message_type: "message".to_string(),
            role: "assistant".to_string(),
            content: self.content(),
            model: "claude-test".to_string(),
            stop_reason: Some(self.stop_reason()),
            stop_sequence: None,
            usage: Usage::default(),
        }
    }

    fn events(&self) -> Vec<MessageStreamEvent> {
        let mut start = self.message();
        start.content = Vec::new();
        start.stop_reason = None;

        let mut events = vec![MessageStreamEvent::MessageStart { message: start }];
        for (i, block) in self.content().into_iter().enumerate() {
            let index = i as u32;
            let delta = match &block {
                ContentBlock::Text { text, .. } => ContentBlockDelta::TextDelta { text: text.clone() },
                ContentBlock::ToolUse { input, .. } => ContentBlockDelta::InputJsonDelta {
                    partial_json: input.to_string(),
                },
                _ => continue,
            };
            let content_block = match block {
                ContentBlock::Text { .. } => ContentBlock::Text {
                    text: String::new(),
                    citations: None,
                },
                ContentBlock::ToolUse { id, name, .. } => ContentBlock::ToolUse {
                    id,
                    name,
                    input: json!({}),
                },
                other => other,
            };
            events.push(MessageStreamEvent::ContentBlockStart {
                index,
                content_block,
            });
            events.push(MessageStreamEvent::ContentBlockDelta { index, delta });
            events.push(MessageStreamEvent::ContentBlockStop { index });
        }
        events.push(MessageStreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(self.stop_reason()),
                stop_sequence: None,
            },
            usage: None,
        });
        events.push(MessageStreamEvent::MessageStop);
        events
    }
}

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CreateMessageRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CreateMessageRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &CreateMessageRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::text("out of script"))
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn create_message(&self, request: &CreateMessageRequest) -> Result<Message, LlmError> {
        let reply = self.next(request);
        if let Reply::Hang = reply {
            futures::future::pending::<()>().await;
        }
        Ok(reply.message())
    }

    async fn stream_message(
        &self,
        request: &CreateMessageRequest,
    ) -> Result<ModelEventStream, LlmError> {
        let reply = self.next(request);
        if let Reply::Hang = reply {
            return Ok(Box::pin(futures::stream::pending()));
        }
        Ok(Box::pin(futures::stream::iter(
            reply.events().into_iter().map(Ok::<_, LlmError>),
        )))
    }
}

// ----------------------------------------------------------------------
// In-memory MCP server
// ----------------------------------------------------------------------

pub struct MockToolServer {
    name: String,
    pub calls: Mutex<Vec<(String, Value)>>,
    pub closes: AtomicUsize,
    pub fail: bool,
}

impl MockToolServer {
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, false)
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, true)
    }

    fn build(name: &str, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            fail,
        })
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolService for MockToolServer {
    fn server_name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> McpResult<Vec<McpTool>> {
        if self.fail {
            return Err(McpError::ConnectionFailed("connection refused".to_string()));
        }
        Ok(vec![
            McpTool {
                name: "get_roster".to_string(),
                description: Some("Get a team roster".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"team_id": {"type": "integer"}},
                    "required": ["team_id"]
                }),
            },
            McpTool {
                name: "get_matchups".to_string(),
                description: Some("Get weekly matchups".to_string()),
                input_schema: json!({"type": "object", "properties": {}}),
            },
        ])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolCallOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        if self.fail {
            return Err(McpError::ConnectionFailed("connection refused".to_string()));
        }
        Ok(ToolCallOutput::text(format!("{name} result for {arguments}")))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out the same mock for every `open` of a known server.
pub struct MockConnector {
    servers: Vec<Arc<MockToolServer>>,
}

impl MockConnector {
    pub fn new(servers: Vec<Arc<MockToolServer>>) -> Arc<Self> {
        Arc::new(Self { servers })
    }
}

impl ToolConnector for MockConnector {
    fn server_names(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.name.clone()).collect()
    }

    fn open(&self, server: &str) -> McpResult<Arc<dyn ToolService>> {
        self.servers
            .iter()
            .find(|s| s.name == server)
            .map(|s| Arc::clone(s) as Arc<dyn ToolService>)
            .ok_or_else(|| McpError::ServerNotFound(server.to_string()))
    }
}

// ----------------------------------------------------------------------
// App helpers
// ----------------------------------------------------------------------

pub fn test_settings() -> ChatSettings {
    ChatSettings {
        model: "claude-test".to_string(),
        max_tokens: 4000,
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        max_tool_iterations: 10,
        request_timeout: Duration::from_secs(60),
        tool_list_timeout: Duration::from_secs(10),
        tool_server: "espn".to_string(),
    }
}

pub fn test_app(
    model: Option<Arc<dyn ModelClient>>,
    connector: Arc<MockConnector>,
    settings: ChatSettings,
) -> Router {
    build_app(ChatContext::new(model, connector, settings))
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, bytes) = post_raw(app, uri, body.to_string()).await;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

/// Split a streamed body into its `data:` records.
pub fn parse_records(body: &[u8]) -> Vec<Value> {
    std::str::from_utf8(body)
        .unwrap()
        .split("\n\n")
        .filter(|record| !record.is_empty())
        .map(|record| {
            let data = record
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("record without data prefix: {record:?}"));
            serde_json::from_str(data).unwrap()
        })
        .collect()
}
