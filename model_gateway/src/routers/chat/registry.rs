//! Tool registry for a chat request
//!
//! Lists the live tools of the MCP server once per request, bounded by a
//! timeout, and falls back to the built-in fantasy tool list when the live
//! list is unavailable or unusable.

use std::{collections::HashSet, fmt, time::Duration};

use fantasy_mcp::{McpTool, ToolService};
use fantasy_protocol::messages::{InputSchema, Tool};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::observability::metrics::Metrics;

/// Where the tool list of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    Remote,
    Builtin,
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolSource::Remote => f.write_str("remote"),
            ToolSource::Builtin => f.write_str("builtin"),
        }
    }
}

/// Resolve the tools offered to the model. Never fails.
pub async fn resolve_tools(service: &dyn ToolService, timeout: Duration) -> (Vec<Tool>, ToolSource) {
    let reason = match tokio::time::timeout(timeout, service.list_tools()).await {
        Ok(Ok(remote)) => {
            let tools = convert_tools(remote);
            if !tools.is_empty() {
                debug!(
                    server = %service.server_name(),
                    tool_count = tools.len(),
                    "Using live MCP tool list"
                );
                return (tools, ToolSource::Remote);
            }
            "no usable tools".to_string()
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}s", timeout.as_secs()),
    };

    warn!(
        server = %service.server_name(),
        reason = %reason,
        "Failed to list MCP tools, using built-in tool list"
    );
    Metrics::record_tool_registry_fallback();
    (builtin_tools(), ToolSource::Builtin)
}

fn convert_tools(remote: Vec<McpTool>) -> Vec<Tool> {
    let mut seen = HashSet::new();
    let mut tools = Vec::with_capacity(remote.len());

    for tool in remote {
        let Some(input_schema) = convert_schema(&tool.input_schema) else {
            warn!(tool = %tool.name, "Skipping MCP tool with non-object input schema");
            continue;
        };
        if !seen.insert(tool.name.clone()) {
            warn!(tool = %tool.name, "Dropping duplicate MCP tool name");
            continue;
        }
        tools.push(Tool {
            name: tool.name,
            description: tool.description,
            input_schema,
            cache_control: None,
        });
    }

    tools
}

/// Keep `type`, `properties` and `required`; carry any other key through.
fn convert_schema(schema: &Value) -> Option<InputSchema> {
    let schema_map = schema.as_object()?;

    let schema_type = schema_map
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("object")
        .to_string();

    let properties = schema_map
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned();

    let required = schema_map
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        });

    let additional: Map<String, Value> = schema_map
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "type" | "properties" | "required"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Some(InputSchema {
        schema_type,
        properties,
        required,
        additional,
    })
}

fn builtin_tool(name: &str, description: &str, properties: Value, required: &[&str]) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: InputSchema {
            schema_type: "object".to_string(),
            properties: properties.as_object().cloned(),
            required: (!required.is_empty())
                .then(|| required.iter().map(|s| s.to_string()).collect()),
            additional: Map::new(),
        },
        cache_control: None,
    }
}

/// The ESPN fantasy tools, used when the live list is unavailable.
pub fn builtin_tools() -> Vec<Tool> {
    vec![
        builtin_tool(
            "get_roster",
            "Get the current roster for your fantasy team",
            json!({
                "team_id": {"type": "number", "description": "Team ID (optional, defaults to your team)"}
            }),
            &[],
        ),
        builtin_tool(
            "get_matchups",
            "Get fantasy matchups with live scores",
            json!({
                "week": {"type": "number", "description": "NFL week number (optional)"}
            }),
            &[],
        ),
        builtin_tool(
            "get_league_teams",
            "Get all teams in your fantasy league with standings",
            json!({}),
            &[],
        ),
        builtin_tool(
            "get_free_agents",
            "Get available free agents by position",
            json!({
                "position": {"type": "string", "description": "Position filter (QB, RB, WR, TE, K, D/ST)"},
                "size": {"type": "number", "description": "Number of players to return (default 50)"}
            }),
            &[],
        ),
        builtin_tool(
            "get_player_stats",
            "Get detailed statistics for a specific player",
            json!({
                "player_id": {"type": "number", "description": "ESPN player ID"},
                "weeks": {"type": "array", "items": {"type": "number"}, "description": "Specific weeks to analyze"}
            }),
            &["player_id"],
        ),
        builtin_tool(
            "get_live_player_stats",
            "Get live player stats for current week",
            json!({
                "week": {"type": "number", "description": "NFL week number"},
                "team_id": {"type": "number", "description": "Team ID to filter by"}
            }),
            &[],
        ),
        builtin_tool(
            "get_power_rankings",
            "Get team power rankings based on strength analysis",
            json!({
                "week": {"type": "number", "description": "Week to calculate rankings for"}
            }),
            &[],
        ),
        builtin_tool(
            "get_positional_rankings",
            "Get matchup rankings showing defense strength against positions",
            json!({
                "week": {"type": "number", "description": "NFL week number"}
            }),
            &[],
        ),
        builtin_tool(
            "get_recent_transactions",
            "Get recent league transactions and activity",
            json!({
                "size": {"type": "number", "description": "Number of transactions to return"},
                "activity_type": {"type": "string", "description": "Filter by activity type (FA, WAIVER, TRADED)"}
            }),
            &[],
        ),
        builtin_tool(
            "change_lineup",
            "Move players between roster positions",
            json!({
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "playerId": {"type": "number", "description": "ESPN player ID"},
                            "fromLineupSlotId": {"type": "number", "description": "Current position slot ID"},
                            "toLineupSlotId": {"type": "number", "description": "New position slot ID"}
                        },
                        "required": ["playerId", "fromLineupSlotId", "toLineupSlotId"]
                    }
                }
            }),
            &["items"],
        ),
    ]
}
