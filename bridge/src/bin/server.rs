use std::sync::Arc;

use tracing::{info, warn};

use vvmcp_bridge::McpServer;
use vvmcp_core::telemetry::{init_tracing, DEFAULT_LOG_FILTER};
use vvmcp_core::tools::native::speech_registry;
use vvmcp_core::{SpeechConfig, SpeechService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();
    if let Err(e) = init_tracing(DEFAULT_LOG_FILTER) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let config = SpeechConfig::load();
    info!(
        target: "vvmcp_server",
        engine_url = %config.engine_url,
        speaker = config.default_speaker,
        auto_start = config.auto_start,
        tool_call_timeout_ms = config.tool_call_timeout_ms,
        "Starting VOICEVOX MCP server"
    );

    let service = Arc::new(SpeechService::new(config)?);

    // Best effort: a failure here is reported again on the first tool call
    match service.ensure_engine().await {
        Ok(()) => info!(target: "vvmcp_server", "VOICEVOX Engine is ready"),
        Err(e) => warn!(target: "vvmcp_server", code = e.code(), error = %e, "VOICEVOX Engine not ready at startup"),
    }

    let registry = speech_registry(Arc::clone(&service));

    let server = McpServer::new(registry);
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;

    info!(target: "vvmcp_server", "Server stopped");
    Ok(())
}
