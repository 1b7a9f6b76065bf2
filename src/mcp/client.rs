//! [`ToolServer`] implementation that talks to an external process over stdio.

use super::protocol::{descriptor_from_json, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::tools::{ToolInvokeError, ToolServer};
use crate::types::{Arguments, ToolDescriptor, ToolResponse};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Channel {
    reader: Reader,
    writer: Writer,
    next_id: u64,
    // Held so the child is killed when the client is dropped.
    _child: Option<Child>,
}

/// Client end of a stdio tool server. Requests are serialized: one
/// outstanding request at a time.
pub struct StdioToolServer {
    channel: Mutex<Channel>,
}

impl StdioToolServer {
    /// Spawn `command` and complete the initialize handshake.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, ToolInvokeError> {
        info!("Spawning tool server: {} {}", command, args.join(" "));
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolInvokeError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolInvokeError::Protocol("failed to capture server stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolInvokeError::Protocol("failed to capture server stdout".into()))?;

        let server = Self::from_parts(
            Box::new(BufReader::new(stdout)),
            Box::new(stdin),
            Some(child),
        );
        server.initialize().await?;
        Ok(server)
    }

    /// Connect over an existing byte channel and complete the handshake.
    pub async fn connect<R, W>(reader: R, writer: W) -> Result<Self, ToolInvokeError>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let server = Self::from_parts(Box::new(reader), Box::new(writer), None);
        server.initialize().await?;
        Ok(server)
    }

    fn from_parts(reader: Reader, writer: Writer, child: Option<Child>) -> Self {
        Self {
            channel: Mutex::new(Channel {
                reader,
                writer,
                next_id: 1,
                _child: child,
            }),
        }
    }

    async fn initialize(&self) -> Result<(), ToolInvokeError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {},
                }),
            )
            .await?;
        if let Some(version) = result.get("protocolVersion").and_then(Value::as_str) {
            if version != PROTOCOL_VERSION {
                warn!("Tool server speaks protocol {}, expected {}", version, PROTOCOL_VERSION);
            }
        }

        let mut channel = self.channel.lock().await;
        let note = JsonRpcRequest::notification("notifications/initialized", Value::Null);
        write_message(&mut channel.writer, &note).await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        let mut channel = self.channel.lock().await;
        let id = channel.next_id;
        channel.next_id += 1;

        debug!("-> {} (id {})", method, id);
        write_message(&mut channel.writer, &JsonRpcRequest::new(id, method, params)).await?;

        let mut line = String::new();
        loop {
            line.clear();
            if channel.reader.read_line(&mut line).await? == 0 {
                return Err(ToolInvokeError::Terminated);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response: JsonRpcResponse = match serde_json::from_str(trimmed) {
                Ok(response) => response,
                Err(_) => {
                    debug!("Skipping non-response line from tool server: {}", trimmed);
                    continue;
                }
            };
            if response.id != Value::from(id) {
                debug!("Skipping response for id {}", response.id);
                continue;
            }
            if let Some(error) = response.error {
                return Err(ToolInvokeError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return response
                .result
                .ok_or_else(|| ToolInvokeError::Protocol(format!("{} returned no result", method)));
        }
    }
}

async fn write_message(writer: &mut Writer, request: &JsonRpcRequest) -> Result<(), ToolInvokeError> {
    let mut text = serde_json::to_string(request)?;
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait]
impl ToolServer for StdioToolServer {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        let result = self.request("tools/list", json!({})).await?;
        let entries = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolInvokeError::Protocol("tools/list result has no 'tools'".into()))?;
        let mut tools = Vec::with_capacity(entries.len());
        for entry in entries {
            match descriptor_from_json(entry) {
                Some(tool) => tools.push(tool),
                None => warn!("Ignoring malformed tool entry: {}", entry),
            }
        }
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> Result<ToolResponse, ToolInvokeError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}
