//! Bodies of the MCP proxy endpoint `POST /api/mcp/{server}/{action}`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation requested on a proxied MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAction {
    /// List the server's tools.
    Tools,
    /// Call one tool.
    Call,
}

impl FromStr for ProxyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tools" => Ok(ProxyAction::Tools),
            "call" => Ok(ProxyAction::Call),
            other => Err(format!("Invalid action: {other}. Must be 'tools' or 'call'")),
        }
    }
}

impl fmt::Display for ProxyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyAction::Tools => f.write_str("tools"),
            ProxyAction::Call => f.write_str("call"),
        }
    }
}

/// Body of a `call` action. Empty for `tools`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyCallRequest {
    pub tool: Option<String>,

    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One entry of the `tools` action's response, which is a bare JSON array
/// of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyToolInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyCallResponse {
    /// MCP content items as returned by the server.
    pub content: Value,
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!("tools".parse::<ProxyAction>(), Ok(ProxyAction::Tools));
        assert_eq!("call".parse::<ProxyAction>(), Ok(ProxyAction::Call));
        assert_eq!(
            "delete".parse::<ProxyAction>(),
            Err("Invalid action: delete. Must be 'tools' or 'call'".to_string())
        );
    }

    #[test]
    fn test_tool_list_is_bare_array() {
        let tools = vec![ProxyToolInfo {
            name: "get_roster".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
        }];
        assert_eq!(
            serde_json::to_value(&tools).unwrap(),
            json!([{"name": "get_roster", "inputSchema": {"type": "object"}}])
        );
    }

    #[test]
    fn test_call_response_camel_case() {
        let value = serde_json::to_value(ProxyCallResponse {
            content: json!([{"type": "text", "text": "ok"}]),
            is_error: false,
        })
        .unwrap();
        assert_eq!(value["isError"], false);
        assert_eq!(value["content"][0]["text"], "ok");
    }
}
