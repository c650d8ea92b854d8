//! MCP configuration types and utilities.
//!
//! Defines the per-server configuration (endpoint, auth, headers) and the
//! HTTP client built from it.

use std::{collections::HashMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{McpError, McpResult};

/// Path appended to a server's base URL to reach its streamable HTTP endpoint.
pub const MCP_ENDPOINT_PATH: &str = "/mcp";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct McpConfig {
    /// Known MCP servers, addressed by name.
    pub servers: Vec<McpServerConfig>,
}

impl McpConfig {
    pub fn server(&self, name: &str) -> Option<&McpServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }

    pub fn server_names(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.name.clone()).collect()
    }

    pub fn validate(&self) -> McpResult<()> {
        for server in &self.servers {
            server.validate()?;
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct McpServerConfig {
    pub name: String,

    /// Base URL of the server, e.g. `http://localhost:8000`.
    pub url: String,

    /// Bearer token sent as `Authorization` on every request.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

// Keep the token out of logs.
impl fmt::Debug for McpServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpServerConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            token: None,
            headers: HashMap::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Full streamable HTTP endpoint (`{url}/mcp`).
    pub fn endpoint(&self) -> String {
        let base = self.url.trim_end_matches('/');
        if base.ends_with(MCP_ENDPOINT_PATH) {
            base.to_string()
        } else {
            format!("{base}{MCP_ENDPOINT_PATH}")
        }
    }

    pub fn validate(&self) -> McpResult<()> {
        let parsed = Url::parse(&self.url)
            .map_err(|e| McpError::Config(format!("server '{}' url: {}", self.name, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(McpError::Config(format!(
                "server '{}' url must be http or https, got '{}'",
                self.name,
                parsed.scheme()
            )));
        }
        build_request_headers(&self.token, &self.headers).map(|_| ())
    }

    /// Build the HTTP client used by the streamable transport.
    pub fn build_http_client(&self) -> McpResult<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs));

        let req_headers = build_request_headers(&self.token, &self.headers)?;
        if !req_headers.is_empty() {
            builder = builder.default_headers(req_headers);
        }

        Ok(builder.build()?)
    }
}

fn build_request_headers(
    token: &Option<String>,
    custom_headers: &HashMap<String, String>,
) -> McpResult<reqwest::header::HeaderMap> {
    let mut headers = reqwest::header::HeaderMap::new();

    if let Some(tok) = token {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", tok)
                .parse()
                .map_err(|e| McpError::Config(format!("auth token: {}", e)))?,
        );
    }

    for (key, value) in custom_headers {
        headers.insert(
            reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpError::Config(format!("header name: {}", e)))?,
            value
                .parse()
                .map_err(|e| McpError::Config(format!("header value: {}", e)))?,
        );
    }

    Ok(headers)
}
