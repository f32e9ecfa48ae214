//! Drives the MCP loop over an in-memory pipe, the way a client talks to it on stdio

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

use vvmcp_bridge::McpServer;
use vvmcp_core::tools::native::speech_registry;
use vvmcp_core::{SpeechConfig, SpeechService, Tool, ToolError, ToolRegistry, ToolResult};

struct Shout;

#[async_trait]
impl Tool for Shout {
    fn name(&self) -> String {
        "shout".to_string()
    }
    fn description(&self) -> String {
        "Upper-case the text argument".to_string()
    }
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }
    async fn call(&self, arguments: Value) -> ToolResult<String> {
        arguments["text"]
            .as_str()
            .map(|s| s.to_uppercase())
            .ok_or_else(|| ToolError::InvalidArguments("missing field `text`".to_string()))
    }
}

struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    server: JoinHandle<vvmcp_bridge::Result<()>>,
}

impl Client {
    async fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.lines.next_line().await.unwrap().expect("response line");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, msg: Value) -> Value {
        self.send(&msg.to_string()).await;
        self.recv().await
    }
}

fn start(registry: ToolRegistry) -> Client {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let server = tokio::spawn(async move {
        McpServer::new(registry)
            .serve(server_read, server_write)
            .await
    });

    let (client_read, writer) = tokio::io::split(client_io);
    Client {
        lines: BufReader::new(client_read).lines(),
        writer,
        server,
    }
}

fn shout_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(Shout));
    registry
}

/// Speech tools against an address where no engine listens, auto-start off
fn offline_speech_registry() -> ToolRegistry {
    let addr = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };
    let config = SpeechConfig {
        engine_url: format!("http://{}", addr),
        default_speaker: 8,
        auto_start: false,
        start_command: vec!["true".into()],
        project_dir: PathBuf::from("."),
        compose_file: None,
        startup_timeout_ms: 200,
        poll_interval_ms: 20,
        probe_timeout_ms: 200,
        request_timeout_ms: 1_000,
        probe_cache_ms: 0,
        player_command: vec!["true".into()],
        tool_call_timeout_ms: 0,
    };
    speech_registry(Arc::new(SpeechService::new(config).unwrap()))
}

#[tokio::test]
async fn initialize_then_list_tools() {
    let mut client = start(offline_speech_registry());

    let resp = client
        .request(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {},
                       "clientInfo": {"name": "test-client", "version": "0.0.1"}}
        }))
        .await;
    assert_eq!(resp["id"], json!(1));
    assert_eq!(resp["result"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(resp["result"]["serverInfo"]["name"], json!("voicevox"));
    assert!(resp["result"]["capabilities"]["tools"].is_object());

    // Notifications get no reply; the next line must answer the ping
    client
        .send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    let resp = client.request(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await;
    assert_eq!(resp["id"], json!(2));
    assert_eq!(resp["result"], json!({}));

    let resp = client
        .request(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}))
        .await;
    let names: Vec<&str> = resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["list_speakers", "save_audio", "speak_text"]);
    let speak = &resp["result"]["tools"][2];
    assert_eq!(speak["inputSchema"]["required"], json!(["text"]));
}

#[tokio::test]
async fn tools_call_returns_text_content() {
    let mut client = start(shout_registry());
    let resp = client
        .request(json!({
            "jsonrpc": "2.0", "id": "c1", "method": "tools/call",
            "params": {"name": "shout", "arguments": {"text": "hello"}}
        }))
        .await;
    assert_eq!(resp["id"], json!("c1"));
    assert_eq!(
        resp["result"],
        json!({"content": [{"type": "text", "text": "HELLO"}], "isError": false})
    );
}

#[tokio::test]
async fn operation_failure_is_an_error_result() {
    let mut client = start(offline_speech_registry());
    let resp = client
        .request(json!({
            "jsonrpc": "2.0", "id": 9, "method": "tools/call",
            "params": {"name": "speak_text", "arguments": {"text": "こんにちは"}}
        }))
        .await;
    assert!(resp.get("error").is_none(), "{resp}");
    assert_eq!(resp["result"]["isError"], json!(true));
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error: Engine unavailable"), "{text}");
}

#[tokio::test]
async fn invalid_parameter_is_reported_as_error_text() {
    let mut client = start(offline_speech_registry());
    let resp = client
        .request(json!({
            "jsonrpc": "2.0", "id": 10, "method": "tools/call",
            "params": {"name": "speak_text", "arguments": {"text": "hi", "speed": 9.0}}
        }))
        .await;
    assert_eq!(resp["result"]["isError"], json!(true));
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("speed must be between 0.5 and 2"), "{text}");
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() {
    let mut client = start(shout_registry());

    client.send("{definitely not json").await;
    let resp = client.recv().await;
    assert_eq!(resp["id"], Value::Null);
    assert_eq!(resp["error"]["code"], json!(-32700));

    let resp = client
        .request(json!({"jsonrpc": "2.0", "id": 2, "method": "prompts/list"}))
        .await;
    assert_eq!(resp["error"]["code"], json!(-32601));

    let resp = client
        .request(json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "missing_tool", "arguments": {}}
        }))
        .await;
    assert_eq!(resp["error"]["code"], json!(-32602));

    let resp = client
        .request(json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": {"name": "shout", "arguments": {}}
        }))
        .await;
    assert_eq!(resp["error"]["code"], json!(-32602));

    let resp = client
        .request(json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call"}))
        .await;
    assert_eq!(resp["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn non_utf8_line_is_rejected_and_serving_continues() {
    let mut client = start(shout_registry());

    client.writer.write_all(b"\xff\xfe\n").await.unwrap();
    client.writer.flush().await.unwrap();
    let resp = client.recv().await;
    assert_eq!(resp["id"], Value::Null);
    assert_eq!(resp["error"]["code"], json!(-32700));

    let resp = client.request(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await;
    assert_eq!(resp["id"], json!(2));
    assert_eq!(resp["result"], json!({}));
    assert!(!client.server.is_finished());
}

#[tokio::test]
async fn null_id_request_gets_a_reply() {
    let mut client = start(shout_registry());
    client
        .send(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
        .await;
    let resp = tokio::time::timeout(std::time::Duration::from_secs(5), client.recv())
        .await
        .expect("reply to null-id request");
    assert_eq!(resp["id"], Value::Null);
    assert_eq!(resp["result"], json!({}));
}

#[tokio::test]
async fn server_stops_when_input_closes() {
    let mut client = start(shout_registry());
    let resp = client.request(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    assert_eq!(resp["result"], json!({}));

    client.writer.shutdown().await.unwrap();
    drop(client.writer);
    let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), client.server)
        .await
        .expect("server finished")
        .unwrap();
    assert!(outcome.is_ok());
    assert!(client.lines.next_line().await.unwrap().is_none());
}
