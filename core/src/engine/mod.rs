//! Engine lifecycle: reachability probing and on-demand startup.
//!
//! - `probe`: single best-effort `GET /version` check
//! - `launcher`: start command + bounded readiness poll
pub mod launcher;
pub mod probe;

pub use launcher::{CommandStarter, EngineStarter, EngineSupervisor, LaunchPolicy};
pub use probe::{EngineProbe, HttpProbe};

use thiserror::Error;

/// Why the engine could not be made reachable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(
        "VOICEVOX Engine ({url}) is not reachable and auto-start is disabled. \
         Start it manually (e.g. `{hint}`) or set AUTO_START_ENGINE=true"
    )]
    Unreachable { url: String, hint: String },

    #[error("failed to launch VOICEVOX Engine: {reason}. Start it manually with `{hint}`")]
    LaunchFailed { reason: String, hint: String },

    #[error(
        "VOICEVOX Engine ({url}) did not become ready within {waited_ms} ms. \
         Check the container logs or start it manually with `{hint}`"
    )]
    StartupTimeout {
        url: String,
        waited_ms: u64,
        hint: String,
    },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Unreachable { .. } => "ENGINE_UNREACHABLE",
            EngineError::LaunchFailed { .. } => "ENGINE_LAUNCH_FAILED",
            EngineError::StartupTimeout { .. } => "ENGINE_STARTUP_TIMEOUT",
        }
    }
}
