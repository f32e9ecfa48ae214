//! Request orchestration.
//!
//! Every public operation runs the same pipeline:
//! validate → ensure engine → synthesize → sink → message.
//! The `try_*` methods return typed errors; the plain methods translate every
//! outcome into a single caller-facing string and never fail.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::audio::{write_wav_atomic, AudioPlayer, CommandPlayer};
use crate::config::SpeechConfig;
use crate::engine::{CommandStarter, EngineProbe, EngineStarter, EngineSupervisor, HttpProbe};
use crate::params::{self, SpeechParams};
use crate::synthesis::{Speaker, SynthesisBackend, VoicevoxClient};
use crate::Result;

/// Characters of the input text echoed back in the "spoken" message
const PREVIEW_CHARS: usize = 20;

pub struct SpeechService {
    config: Arc<SpeechConfig>,
    supervisor: EngineSupervisor,
    backend: Arc<dyn SynthesisBackend>,
    player: Arc<dyn AudioPlayer>,
}

impl SpeechService {
    /// Wire the production collaborators from configuration
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let probe = Arc::new(HttpProbe::new(&config.engine_url, config.probe_timeout()));

        let mut starter =
            CommandStarter::new(config.start_command.clone(), config.project_dir.clone());
        if let Some(ref file) = config.compose_file {
            starter = starter.require_file(file);
        }

        let backend = Arc::new(VoicevoxClient::new(
            &config.engine_url,
            config.request_timeout(),
        ));
        let player = Arc::new(CommandPlayer::new(&config.player_command)?);

        Ok(Self::with_parts(
            config,
            probe,
            Arc::new(starter),
            backend,
            player,
        ))
    }

    /// Assemble a service from explicit collaborators (fakes in tests)
    pub fn with_parts(
        config: SpeechConfig,
        probe: Arc<dyn EngineProbe>,
        starter: Arc<dyn EngineStarter>,
        backend: Arc<dyn SynthesisBackend>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        let supervisor = EngineSupervisor::new(
            config.engine_url.clone(),
            probe,
            starter,
            config.launch_policy(),
        );
        Self {
            config: Arc::new(config),
            supervisor,
            backend,
            player,
        }
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    /// Make sure the engine answers, starting it when allowed
    pub async fn ensure_engine(&self) -> Result<()> {
        self.supervisor.ensure_running().await?;
        Ok(())
    }

    /// Synthesize and play; returns the caller-facing success message
    #[tracing::instrument(target = "speech_service", skip_all, fields(chars = params.text.chars().count()))]
    pub async fn try_speak_text(&self, params: &SpeechParams) -> Result<String> {
        let request = params::validate(params, self.config.default_speaker)?;
        self.ensure_engine().await?;

        let wav = self.backend.synthesize(&request).await?;
        self.player.play(&wav).await?;

        info!(target: "speech_service", speaker = request.speaker_id(), bytes = wav.len(), "Spoke text");
        Ok(format!("Played \"{}\"", preview(request.text())))
    }

    /// Synthesize and save to `output_path`; returns the written path
    #[tracing::instrument(target = "speech_service", skip_all, fields(path = %output_path))]
    pub async fn try_save_audio(&self, params: &SpeechParams, output_path: &str) -> Result<PathBuf> {
        let request = params::validate(params, self.config.default_speaker)?;
        let path = params::validate_output_path(output_path)?;
        self.ensure_engine().await?;

        let wav = self.backend.synthesize(&request).await?;
        let saved = write_wav_atomic(&path, wav).await?;

        info!(target: "speech_service", speaker = request.speaker_id(), path = %saved.display(), "Saved audio");
        Ok(saved)
    }

    pub async fn try_list_speakers(&self) -> Result<Vec<Speaker>> {
        self.ensure_engine().await?;
        Ok(self.backend.speakers().await?)
    }

    /// `speak_text` operation: success or error text, never a fault
    pub async fn speak_text(&self, params: &SpeechParams) -> String {
        match self.try_speak_text(params).await {
            Ok(msg) => msg,
            Err(e) => {
                warn!(target: "speech_service", code = e.code(), error = %e, "speak_text failed");
                e.to_message()
            }
        }
    }

    /// `save_audio` operation: success or error text, never a fault
    pub async fn save_audio(&self, params: &SpeechParams, output_path: &str) -> String {
        match self.try_save_audio(params, output_path).await {
            Ok(path) => saved_message(&path),
            Err(e) => {
                warn!(target: "speech_service", code = e.code(), error = %e, "save_audio failed");
                e.to_message()
            }
        }
    }

    /// `list_speakers` operation: formatted list or error text
    pub async fn list_speakers(&self) -> String {
        match self.try_list_speakers().await {
            Ok(speakers) => format_speakers(&speakers),
            Err(e) => {
                warn!(target: "speech_service", code = e.code(), error = %e, "list_speakers failed");
                e.to_message()
            }
        }
    }
}

/// Success text for a saved file
pub fn saved_message(path: &Path) -> String {
    format!("Saved audio to {}", path.display())
}

/// One line per style, under a header
pub fn format_speakers(speakers: &[Speaker]) -> String {
    let mut lines = vec!["Available speakers:".to_string()];
    for speaker in speakers {
        for style in &speaker.styles {
            lines.push(format!(
                "- {} ({}): speaker_id={}",
                speaker.name, style.name, style.id
            ));
        }
    }
    lines.join("\n")
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
