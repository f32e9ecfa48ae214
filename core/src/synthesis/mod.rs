//! VOICEVOX HTTP client: audio query → synthesis, plus speaker listing.
pub mod client;
pub mod query;

pub use client::{Speaker, SpeakerStyle, SynthesisBackend, VoicevoxClient};
pub use query::AudioQuery;

use thiserror::Error;

/// Upstream failure in one of the engine's HTTP stages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("audio query failed{}: {message}", status_suffix(.status))]
    QueryFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("synthesis failed{}: {message}", status_suffix(.status))]
    SynthesisFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("speaker listing failed{}: {message}", status_suffix(.status))]
    SpeakersFailed {
        status: Option<u16>,
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" (status: {})", s))
        .unwrap_or_default()
}

impl SynthesisError {
    pub fn code(&self) -> &'static str {
        match self {
            SynthesisError::QueryFailed { .. } => "QUERY_FAILED",
            SynthesisError::SynthesisFailed { .. } => "SYNTHESIS_FAILED",
            SynthesisError::SpeakersFailed { .. } => "SPEAKERS_FAILED",
        }
    }

    /// Upstream HTTP status, when the engine answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            SynthesisError::QueryFailed { status, .. }
            | SynthesisError::SynthesisFailed { status, .. }
            | SynthesisError::SpeakersFailed { status, .. } => *status,
        }
    }
}
