//! JSON-RPC 2.0 loop over newline-delimited streams.
//!
//! One line in, at most one line out. Every request runs on its own task and
//! hands its response to a single writer task, so responses may be reordered
//! but are never interleaved. The loop ends at EOF on the reader once every
//! in-flight request has answered.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use vvmcp_core::{ToolError, ToolRegistry};

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, McpError, McpTool, Result, ServerCapabilities, ServerInfo,
    ToolsCapability, DEFAULT_PROTOCOL_VERSION, SERVER_NAME, SUPPORTED_PROTOCOL_VERSIONS,
};

const OUTBOUND_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct McpServer {
    registry: ToolRegistry,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Serve until `reader` reaches EOF
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<JsonRpcResponse>(OUTBOUND_CAPACITY);
        let writer_handle = tokio::spawn(write_responses(writer, rx));

        info!(target: "mcp_server", server = %self.info.name, "MCP server listening on stdio");

        // Raw bytes: a line that is not UTF-8 is a parse error, not a dead stream
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            let request = match parse_line(line) {
                Ok(req) => req,
                Err((id, e)) => {
                    warn!(target: "mcp_server", code = e.code(), error = %e, "Rejected message");
                    if tx
                        .send(JsonRpcResponse::failure(id, e.to_rpc_error()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    continue;
                }
            };

            if request.is_notification() {
                debug!(target: "mcp_server", method = %request.method, "Notification received");
                continue;
            }

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = server.handle_request(request).await;
                if tx.send(response).await.is_err() {
                    warn!(target: "mcp_server", "Writer closed before response was sent");
                }
            });
        }

        info!(target: "mcp_server", "Input closed, draining in-flight requests");
        drop(tx);
        writer_handle
            .await
            .map_err(|e| McpError::Internal(format!("writer task failed: {}", e)))?
    }

    /// Answer one request that carries an id
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);
        debug!(target: "mcp_server", method = %request.method, id = %id, "Handling request");

        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                warn!(target: "mcp_server", method = %request.method, code = e.code(), error = %e, "Request failed");
                JsonRpcResponse::failure(id, e.to_rpc_error())
            }
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = match params {
            Some(v) => serde_json::from_value(v)
                .map_err(|e| McpError::InvalidParams(e.to_string()))?,
            None => InitializeParams::default(),
        };

        let requested = params.protocol_version.as_deref().unwrap_or(DEFAULT_PROTOCOL_VERSION);
        let protocol_version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&requested) {
            requested
        } else {
            DEFAULT_PROTOCOL_VERSION
        };

        if let Some(client) = params.client_info {
            info!(target: "mcp_server", client = %client.name, version = %client.version, protocol = %protocol_version, "Client initialized");
        }

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: self.info.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn list_tools(&self) -> Result<Value> {
        let tools = self
            .registry
            .definitions()
            .into_iter()
            .map(|d| McpTool {
                name: d.name,
                description: Some(d.description),
                input_schema: d.parameters,
            })
            .collect();
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = params
            .ok_or_else(|| McpError::InvalidParams("missing params".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| McpError::InvalidParams(e.to_string()))
            })?;
        let arguments = params.arguments.unwrap_or_else(|| json!({}));

        let result = match self.registry.call(&params.name, arguments).await {
            Ok(text) => CallToolResult::text(text, false),
            Err(ToolError::NotFound(name)) => {
                return Err(McpError::InvalidParams(format!("unknown tool: {}", name)))
            }
            Err(ToolError::InvalidArguments(msg)) => return Err(McpError::InvalidParams(msg)),
            Err(ToolError::ExecutionFailed(msg)) => CallToolResult::text(msg, true),
            Err(ToolError::Timeout) => {
                CallToolResult::text(format!("Error: {} timed out", params.name), true)
            }
        };
        Ok(serde_json::to_value(result)?)
    }
}

/// Decode one line; on failure return the id to answer with and the error
fn parse_line(line: &[u8]) -> std::result::Result<JsonRpcRequest, (Value, McpError)> {
    let value: Value = serde_json::from_slice(line)
        .map_err(|e| (Value::Null, McpError::Parse(e.to_string())))?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|e| (id.clone(), McpError::InvalidRequest(e.to_string())))?;

    if request.jsonrpc != "2.0" {
        return Err((
            id,
            McpError::InvalidRequest(format!("unsupported jsonrpc version {}", request.jsonrpc)),
        ));
    }
    Ok(request)
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!(target: "mcp_server", error = %e, "Failed to write response");
            return Err(e.into());
        }
        writer.flush().await?;
    }
    debug!(target: "mcp_server", "Writer exited");
    Ok(())
}
