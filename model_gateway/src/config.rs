//! Gateway configuration.
//!
//! Parsed once from the command line (with environment fallbacks) and then
//! treated as immutable.

use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use fantasy_mcp::{McpConfig, McpError, McpServerConfig};
use thiserror::Error;
use url::Url;

use crate::routers::chat::{prompt::DEFAULT_SYSTEM_PROMPT, ChatSettings};

pub const ESPN_SERVER: &str = "espn";
pub const SLEEPER_SERVER: &str = "sleeper";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Mcp(#[from] McpError),
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "fantasy-gateway",
    about = "Chat backend that drives an LLM tool-use loop against fantasy football MCP servers"
)]
pub struct GatewayConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Chat requests answer 500 while this is unset.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = "https://api.anthropic.com")]
    pub anthropic_base_url: String,

    #[arg(long, env = "CHAT_MODEL", default_value = "claude-sonnet-4-20250514")]
    pub model: String,

    #[arg(long, default_value_t = 4000)]
    pub max_tokens: u32,

    /// Maximum tool-execution cycles per chat request.
    #[arg(long, env = "CHAT_MAX_TOOL_ITERATIONS", default_value_t = 10)]
    pub max_tool_iterations: u32,

    /// Absolute timeout of a non-streaming chat request.
    #[arg(long, default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Timeout of the live tool listing before falling back to built-in tools.
    #[arg(long, default_value_t = 10)]
    pub tool_list_timeout_secs: u64,

    /// Override the built-in assistant instruction.
    #[arg(long, env = "CHAT_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    #[arg(long, env = "ESPN_MCP_URL", default_value = "http://localhost:8000")]
    pub espn_mcp_url: String,

    #[arg(long, env = "SLEEPER_MCP_URL", default_value = "http://localhost:8001")]
    pub sleeper_mcp_url: String,

    /// MCP server whose tools the chat assistant uses.
    #[arg(long, default_value = ESPN_SERVER)]
    pub chat_tool_server: String,

    /// Bearer token sent to the MCP servers.
    #[arg(long, env = "MCP_AUTH_TOKEN", hide_env_values = true)]
    pub mcp_token: Option<String>,

    /// Log filter, overridden by `RUST_LOG`.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long)]
    pub log_json: bool,

    /// Serve Prometheus metrics on this port.
    #[arg(long)]
    pub prometheus_port: Option<u16>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tool_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_tool_iterations must be at least 1".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 || self.tool_list_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".to_string()));
        }

        Url::parse(&self.anthropic_base_url).map_err(|e| {
            ConfigError::Invalid(format!("anthropic_base_url '{}': {}", self.anthropic_base_url, e))
        })?;

        let mcp = self.mcp_config();
        mcp.validate()?;
        if mcp.server(&self.chat_tool_server).is_none() {
            return Err(ConfigError::Invalid(format!(
                "chat_tool_server '{}' is not one of {:?}",
                self.chat_tool_server,
                mcp.server_names()
            )));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn prometheus_addr(&self) -> Option<SocketAddr> {
        self.prometheus_port
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn mcp_config(&self) -> McpConfig {
        McpConfig {
            servers: vec![
                McpServerConfig::new(ESPN_SERVER, &self.espn_mcp_url)
                    .with_token(self.mcp_token.clone()),
                McpServerConfig::new(SLEEPER_SERVER, &self.sleeper_mcp_url)
                    .with_token(self.mcp_token.clone()),
            ],
        }
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system_prompt: self
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tool_iterations: self.max_tool_iterations,
            request_timeout: self.request_timeout(),
            tool_list_timeout: Duration::from_secs(self.tool_list_timeout_secs),
            tool_server: self.chat_tool_server.clone(),
        }
    }
}
