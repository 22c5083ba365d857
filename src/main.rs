//! Weather MCP Server
//!
//! Exposes National Weather Service alert tools and an echo resource over
//! the Model Context Protocol (JSON-RPC 2.0 on stdio). Logging goes to
//! stderr; stdout carries only protocol traffic.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Runtime;
use tokio::signal;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod nws;
mod tools;

use nws::{NwsClient, WeatherConfig};

// Global configuration, set once at startup
static WEATHER_CONFIG: OnceLock<WeatherConfig> = OnceLock::new();

fn weather_config() -> WeatherConfig {
    WEATHER_CONFIG.get().cloned().unwrap_or_default()
}

#[derive(Deserialize)]
struct RpcRequest {
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

#[derive(Serialize)]
struct RpcSuccessResponse {
    jsonrpc: String,
    result: Value,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
    data: Option<Value>,
}

#[derive(Serialize)]
struct RpcErrorResponse {
    jsonrpc: String,
    error: RpcError,
    id: Option<Value>,
}

fn extract_params(params: Option<&Value>) -> HashMap<String, Value> {
    params
        .and_then(|p| p.as_object())
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn handle_mcp_methods(method: &str, params_map: &HashMap<String, Value>) -> Option<Result<Value>> {
    match method {
        "initialize" => Some(Ok(json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {
                "tools": {},
                "resources": {}
            },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "title": "Weather Alerts MCP Server",
                "version": env!("CARGO_PKG_VERSION")
            }
        }))),
        "tools/list" => Some(Ok(tools::get_tool_schemas())),
        "resources/list" => Some(Ok(json!({ "resources": [] }))),
        "resources/templates/list" => Some(Ok(tools::get_resource_templates())),
        "resources/read" => Some(handle_resource_read(params_map)),
        _ => None,
    }
}

/// Resolve a `resources/read` request. Only the `echo://{message}` template
/// is served.
fn handle_resource_read(params_map: &HashMap<String, Value>) -> Result<Value> {
    let uri = params_map
        .get("uri")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing resource uri"))?;

    let message = uri
        .strip_prefix("echo://")
        .ok_or_else(|| anyhow!("Unsupported resource URI: {uri}"))?;

    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "text/plain",
            "text": nws::echo_resource(message)
        }]
    }))
}

async fn handle_tool_calls(
    method: &str,
    params_map: &HashMap<String, Value>,
) -> Option<Result<Value>> {
    if method != "tools/call" {
        return None;
    }

    let name = match params_map.get("name").and_then(|v| v.as_str()) {
        Some(name) => name,
        None => return Some(Err(anyhow!("Missing tool name"))),
    };

    let arguments: HashMap<String, Value> = params_map
        .get("arguments")
        .and_then(|v| v.as_object())
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    Some(call_tool(name, &arguments).await)
}

async fn call_tool(name: &str, arguments: &HashMap<String, Value>) -> Result<Value> {
    let config = weather_config();

    let text = match name {
        "get_alerts" => {
            let state = arguments
                .get("state")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("Missing required argument: state"))?;
            let client = NwsClient::new(&config)?;
            nws::get_alerts(&client, state).await
        }
        "get_north_america_alerts" => {
            let client = NwsClient::new(&config)?;
            nws::get_north_america_alerts(&client).await
        }
        unknown => return Err(anyhow!("Unknown tool: {unknown}")),
    };

    Ok(json!({
        "content": [{
            "type": "text",
            "text": text
        }]
    }))
}

/// Dispatch one request. `None` means no response should be written
/// (notifications).
async fn handle_method(method: &str, params: Option<&Value>) -> Option<Result<Value>> {
    let params_map = extract_params(params);

    if let Some(result) = handle_mcp_methods(method, &params_map) {
        return Some(result);
    }

    if method.starts_with("notifications/") {
        return None;
    }

    if let Some(result) = handle_tool_calls(method, &params_map).await {
        return Some(result);
    }

    Some(Err(anyhow!("Unknown method: {method}")))
}

async fn rpc_loop() -> Result<()> {
    info!("Starting RPC loop");
    let stdin = tokio::io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        // 30 second read timeout; timing out just re-polls
        let line = match timeout(Duration::from_secs(30), lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                info!("Stdin closed, exiting RPC loop");
                break;
            }
            Ok(Err(e)) => {
                error!("Error reading from stdin: {e}");
                break;
            }
            Err(_) => continue,
        };

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!("Invalid JSON request: {e}");
                continue;
            }
        };
        debug!("Handling method: {}", request.method);

        let Some(method_result) = handle_method(&request.method, request.params.as_ref()).await
        else {
            continue;
        };

        let resp_json = match method_result {
            Ok(result) => serde_json::to_string(&RpcSuccessResponse {
                jsonrpc: "2.0".to_string(),
                result,
                id: request.id,
            })?,
            Err(err) => serde_json::to_string(&RpcErrorResponse {
                jsonrpc: "2.0".to_string(),
                error: RpcError {
                    code: -32600,
                    message: err.to_string(),
                    data: None,
                },
                id: request.id,
            })?,
        };

        // Bounded stdout writes; a wedged host ends the session
        match timeout(
            Duration::from_secs(5),
            stdout.write_all((resp_json + "\n").as_bytes()),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Error writing to stdout: {e}");
                break;
            }
            Err(_) => {
                error!("Timeout writing to stdout, exiting");
                break;
            }
        }
        if timeout(Duration::from_secs(5), stdout.flush()).await.is_err() {
            error!("Timeout flushing stdout, exiting");
            break;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    WEATHER_CONFIG
        .set(WeatherConfig::default())
        .map_err(|_| anyhow!("Weather config already initialized"))?;

    info!("Starting weather MCP server");

    let rt = Runtime::new()?;
    rt.block_on(async {
        tokio::select! {
            result = rpc_loop() => result,
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                Ok(())
            }
        }
    })?;

    info!("Weather MCP server shutdown complete");
    Ok(())
}
