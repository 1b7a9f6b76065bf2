//! Serve a [`ToolServer`] over newline-delimited JSON-RPC.

use super::protocol::{
    descriptor_to_json, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST,
    INTERNAL_ERROR, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::tools::ToolServer;
use crate::types::Arguments;
use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Serve on the process's stdin/stdout until stdin closes.
pub async fn serve(server: &dyn ToolServer) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_io(server, stdin, stdout).await
}

/// Serve requests read from `reader`, writing responses to `writer`.
pub async fn serve_io<R, W>(server: &dyn ToolServer, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Tool server listening on stdio");
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(trimmed) {
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            )),
            Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
                Err(e) => Some(JsonRpcResponse::error(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                )),
                Ok(request) => handle_request(server, request).await,
            },
        };

        if let Some(response) = response {
            let mut text = serde_json::to_string(&response)?;
            text.push('\n');
            writer.write_all(text.as_bytes()).await?;
            writer.flush().await?;
        }
    }
    info!("Input closed, tool server stopping");
    Ok(())
}

async fn handle_request(server: &dyn ToolServer, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    debug!("<- {}", request.method);
    let Some(id) = request.id.clone() else {
        // Notifications get no response.
        if request.method != "notifications/initialized" {
            debug!("Ignoring notification {}", request.method);
        }
        return None;
    };
    if id.is_null() {
        warn!("Rejecting '{}' request with a null id", request.method);
        return Some(JsonRpcResponse::error(
            Value::Null,
            INVALID_REQUEST,
            "Request id must not be null",
        ));
    }

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => match server.list_tools().await {
            Ok(tools) => {
                let tools: Vec<Value> = tools.iter().map(descriptor_to_json).collect();
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        },
        "tools/call" => call_tool(server, id, &request.params).await,
        other => {
            warn!("Unknown method '{}'", other);
            JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other))
        }
    };
    Some(response)
}

async fn call_tool(server: &dyn ToolServer, id: Value, params: &Value) -> JsonRpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "tools/call requires a 'name'");
    };
    let arguments: Arguments = match params.get("arguments") {
        None | Some(Value::Null) => Arguments::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "'arguments' must be an object")
        }
    };

    match server.call_tool(name, arguments).await {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        },
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}
