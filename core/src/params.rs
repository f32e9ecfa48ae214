//! Synthesis parameter validation.
//!
//! Raw caller values arrive as [`SpeechParams`] (everything but `text` optional);
//! [`validate`] applies defaults and range checks and produces an immutable
//! [`SynthesisRequest`]. Nothing here touches the network; the only filesystem
//! side effect is a scratch file created and removed to prove the output
//! directory is writable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, VoxError};

/// Closed range for one numeric synthesis parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

pub const SPEED: ParamRange = ParamRange {
    field: "speed",
    min: 0.5,
    max: 2.0,
    default: 1.0,
};

pub const PITCH: ParamRange = ParamRange {
    field: "pitch",
    min: -0.15,
    max: 0.15,
    default: 0.0,
};

pub const INTONATION: ParamRange = ParamRange {
    field: "intonation",
    min: 0.0,
    max: 2.0,
    default: 1.0,
};

pub const VOLUME: ParamRange = ParamRange {
    field: "volume",
    min: 0.0,
    max: 2.0,
    default: 1.0,
};

impl ParamRange {
    /// Resolve an optional value against this range
    pub fn resolve(&self, value: Option<f64>) -> Result<f64> {
        let v = value.unwrap_or(self.default);
        if v.is_finite() && (self.min..=self.max).contains(&v) {
            Ok(v)
        } else {
            Err(VoxError::InvalidParameter(format!(
                "{} must be between {} and {} (got {})",
                self.field, self.min, self.max, v
            )))
        }
    }
}

/// Caller-supplied synthesis arguments, before defaults and validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    pub text: String,
    #[serde(default)]
    pub speaker: Option<u32>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub pitch: Option<f64>,
    #[serde(default)]
    pub intonation: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl SpeechParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A validated synthesis request. Only [`validate`] constructs one.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    speaker_id: u32,
    speed: f64,
    pitch: f64,
    intonation: f64,
    volume: f64,
}

impl SynthesisRequest {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn speaker_id(&self) -> u32 {
        self.speaker_id
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn intonation(&self) -> f64 {
        self.intonation
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// Apply defaults and range checks.
///
/// Text is checked first, so an empty text is reported even when numeric
/// values are also out of range.
pub fn validate(params: &SpeechParams, default_speaker: u32) -> Result<SynthesisRequest> {
    if params.text.trim().is_empty() {
        return Err(VoxError::InvalidParameter(
            "text must not be empty".to_string(),
        ));
    }

    Ok(SynthesisRequest {
        text: params.text.clone(),
        speaker_id: params.speaker.unwrap_or(default_speaker),
        speed: SPEED.resolve(params.speed)?,
        pitch: PITCH.resolve(params.pitch)?,
        intonation: INTONATION.resolve(params.intonation)?,
        volume: VOLUME.resolve(params.volume)?,
    })
}

/// Check a save target: `.wav` extension and an existing, writable parent directory.
pub fn validate_output_path(raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(VoxError::InvalidParameter(
            "output_path must not be empty".to_string(),
        ));
    }
    let path = PathBuf::from(raw);

    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if !is_wav {
        return Err(VoxError::InvalidParameter(format!(
            "output_path must end with .wav (got {})",
            path.display()
        )));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    check_writable_dir(&parent)?;

    Ok(path)
}

fn check_writable_dir(dir: &Path) -> Result<()> {
    let meta = std::fs::metadata(dir).map_err(|_| {
        VoxError::InvalidParameter(format!(
            "output directory does not exist: {}",
            dir.display()
        ))
    })?;
    if !meta.is_dir() {
        return Err(VoxError::InvalidParameter(format!(
            "output directory is not a directory: {}",
            dir.display()
        )));
    }
    // Permission bits say nothing about mounts or ownership; try a real file
    tempfile::Builder::new()
        .prefix(".vvmcp-check-")
        .tempfile_in(dir)
        .map_err(|e| {
            VoxError::InvalidParameter(format!(
                "output directory is not writable: {} ({})",
                dir.display(),
                e
            ))
        })?;
    Ok(())
}
