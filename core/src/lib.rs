// vvmcp core library
// VOICEVOX speech pipeline: validation, engine supervision, synthesis, output

pub mod audio;
pub mod config;
pub mod engine;
pub mod params;
pub mod service;
pub mod synthesis;
pub mod telemetry;
pub mod tools;

// Export core types
pub use audio::{AudioPlayer, CommandPlayer};
pub use config::SpeechConfig;
pub use engine::{EngineError, EngineProbe, EngineStarter, EngineSupervisor, LaunchPolicy};
pub use params::{SpeechParams, SynthesisRequest};
pub use service::SpeechService;
pub use synthesis::{AudioQuery, Speaker, SynthesisBackend, SynthesisError, VoicevoxClient};
pub use tools::{Tool, ToolError, ToolRegistry, ToolResult};

// Error types
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VoxError {
    /// Stable error code for logs and tool results
    pub fn code(&self) -> &'static str {
        match self {
            VoxError::InvalidParameter(_) => "INVALID_PARAMETER",
            VoxError::EngineUnavailable(_) => "ENGINE_UNAVAILABLE",
            VoxError::Synthesis(_) => "SYNTHESIS_ERROR",
            VoxError::Playback(_) => "PLAYBACK_ERROR",
            VoxError::FileWrite { .. } => "FILE_WRITE_ERROR",
            VoxError::Config(_) => "CONFIG_ERROR",
            VoxError::IoError(_) => "IO_ERROR",
            VoxError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Caller-facing one-line message
    pub fn to_message(&self) -> String {
        format!("Error: {}", self)
    }
}

pub type Result<T> = std::result::Result<T, VoxError>;
