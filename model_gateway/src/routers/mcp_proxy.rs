//! `POST /api/mcp/{server}/{action}`
//!
//! Thin pass-through to a configured MCP server: list its tools or call one.
//! Each request opens its own connection and closes it before answering.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use fantasy_mcp::{McpError, ToolService};
use fantasy_protocol::proxy::{
    ProxyAction, ProxyCallRequest, ProxyCallResponse, ProxyToolInfo,
};
use serde_json::{json, Value};
use tracing::{debug, error, info_span, Instrument};

use super::{chat::ChatContext, error};

pub async fn proxy(
    State(ctx): State<ChatContext>,
    Path((server, action)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let span = info_span!("mcp_proxy", server = %server, action = %action);
    async move {
        let action = match action.parse::<ProxyAction>() {
            Ok(action) => action,
            Err(msg) => return error::bad_request("invalid_action", msg),
        };

        let call = match action {
            ProxyAction::Tools => None,
            ProxyAction::Call => match parse_call(&body) {
                Ok(call) => Some(call),
                Err(response) => return response,
            },
        };

        let service = match ctx.tool_connector.open(&server) {
            Ok(service) => service,
            Err(McpError::ServerNotFound(_)) => {
                return error::bad_request(
                    "invalid_server",
                    invalid_server_message(&server, &ctx.tool_connector.server_names()),
                )
            }
            Err(e) => return failed(action, &server, &e),
        };

        let response = match call {
            None => list_tools(service.as_ref()).await,
            Some((tool, arguments)) => call_tool(service.as_ref(), &tool, arguments).await,
        };
        service.close().await;

        match response {
            Ok(response) => response,
            Err(e) => failed(action, &server, &e),
        }
    }
    .instrument(span)
    .await
}

#[allow(clippy::result_large_err)]
fn parse_call(body: &[u8]) -> Result<(String, Value), Response> {
    let request: ProxyCallRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProxyCallRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| {
            error::bad_request("json_parse_error", format!("Invalid JSON body: {}", e))
        })?
    };

    let tool = request
        .tool
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| error::bad_request("missing_tool", "Missing tool name in request body"))?;

    let arguments = match request.arguments {
        None | Some(Value::Null) => json!({}),
        Some(arguments) => arguments,
    };
    Ok((tool, arguments))
}

async fn list_tools(service: &dyn ToolService) -> Result<Response, McpError> {
    let tools = service.list_tools().await?;
    debug!(tool_count = tools.len(), "Listed MCP tools");
    let tools: Vec<ProxyToolInfo> = tools
        .into_iter()
        .map(|tool| ProxyToolInfo {
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
        })
        .collect();
    Ok(Json(tools).into_response())
}

async fn call_tool(
    service: &dyn ToolService,
    tool: &str,
    arguments: Value,
) -> Result<Response, McpError> {
    let output = service.call_tool(tool, arguments).await?;
    debug!(tool = %tool, is_error = output.is_error, "Proxied MCP tool call");
    Ok(Json(ProxyCallResponse {
        content: output.content,
        is_error: output.is_error,
    })
    .into_response())
}

/// `Invalid server: x. Must be 'espn' or 'sleeper'`, over the configured names.
fn invalid_server_message(server: &str, known: &[String]) -> String {
    let quoted: Vec<String> = known.iter().map(|name| format!("'{}'", name)).collect();
    let choices = match quoted.split_last() {
        None => return format!("Invalid server: {}", server),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    };
    format!("Invalid server: {}. Must be {}", server, choices)
}

fn failed(action: ProxyAction, server: &str, e: &McpError) -> Response {
    error!(error = %e, "MCP proxy request failed");
    error::internal_error(
        "mcp_proxy_failed",
        format!("Failed to {} on {}: {}", action, server, e),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_invalid_server_message() {
        assert_eq!(
            invalid_server_message("yahoo", &names(&["espn", "sleeper"])),
            "Invalid server: yahoo. Must be 'espn' or 'sleeper'"
        );
        assert_eq!(
            invalid_server_message("yahoo", &names(&["espn"])),
            "Invalid server: yahoo. Must be 'espn'"
        );
        assert_eq!(
            invalid_server_message("yahoo", &names(&["espn", "sleeper", "mfl"])),
            "Invalid server: yahoo. Must be 'espn', 'sleeper' or 'mfl'"
        );
    }
}
