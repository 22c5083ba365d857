use serde_json::{json, Value};

/// Get tool schemas for the MCP `tools/list` response.
pub fn get_tool_schemas() -> Value {
    json!({
        "tools": [
            get_alerts_schema(),
            get_north_america_alerts_schema()
        ]
    })
}

fn get_alerts_schema() -> Value {
    json!({
        "name": "get_alerts",
        "description": "Get weather alerts for a US state.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "state": {
                    "type": "string",
                    "description": "Two-letter US state code (e.g. CA, NY)"
                }
            },
            "required": ["state"]
        }
    })
}

fn get_north_america_alerts_schema() -> Value {
    json!({
        "name": "get_north_america_alerts",
        "description": "Get weather alerts for major regions in North America (10 US states and 10 Canadian provinces).",
        "inputSchema": {
            "type": "object",
            "properties": {},
            "required": []
        }
    })
}

/// Get resource templates for the MCP `resources/templates/list` response.
pub fn get_resource_templates() -> Value {
    json!({
        "resourceTemplates": [
            {
                "uriTemplate": "echo://{message}",
                "name": "echo",
                "description": "Echo a message back as a resource",
                "mimeType": "text/plain"
            }
        ]
    })
}
