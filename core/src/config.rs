use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::LaunchPolicy;

/// Default player: ffplay reading the WAV payload from stdin
pub const DEFAULT_PLAYER: &[&str] = &[
    "ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet", "-i", "pipe:0",
];

/// Default engine start command, run inside `project_dir`
pub const DEFAULT_START_COMMAND: &[&str] = &["docker", "compose", "up", "-d"];

/// Process-wide configuration for the speech pipeline.
///
/// Read once at startup (env defaults, then an optional TOML overlay) and never
/// mutated afterwards; the service holds it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    /// VOICEVOX Engine base URL, e.g. http://localhost:50021
    pub engine_url: String,
    /// Speaker (style) id used when a call does not name one
    pub default_speaker: u32,
    /// Start the engine when the first probe fails
    pub auto_start: bool,
    /// Program + args that bring the engine up in the background
    pub start_command: Vec<String>,
    /// Working directory for `start_command`
    pub project_dir: PathBuf,
    /// File that must exist in `project_dir` before launching (compose file)
    pub compose_file: Option<String>,
    pub startup_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// How long a positive probe may be reused; 0 probes on every request
    pub probe_cache_ms: u64,
    /// Program + args that play a WAV stream from stdin
    pub player_command: Vec<String>,
    /// Upper bound for one tool call; 0 lets playback run to the end
    pub tool_call_timeout_ms: u64,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse::<T>().ok())
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn owned(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine_url: env_string("VOICEVOX_URL")
                .unwrap_or_else(|| "http://localhost:50021".to_string()),
            default_speaker: env_parse("SPEAKER_ID").unwrap_or(8),
            auto_start: std::env::var("AUTO_START_ENGINE")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            start_command: env_string("ENGINE_START_COMMAND")
                .map(|s| split_command(&s))
                .unwrap_or_else(|| owned(DEFAULT_START_COMMAND)),
            project_dir: env_string("ENGINE_PROJECT_DIR")
                .map(PathBuf::from)
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from(".")),
            compose_file: match std::env::var("ENGINE_COMPOSE_FILE") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(v),
                Err(_) => Some("docker-compose.yml".to_string()),
            },
            startup_timeout_ms: env_parse("ENGINE_STARTUP_TIMEOUT_MS").unwrap_or(30_000),
            poll_interval_ms: env_parse("ENGINE_POLL_INTERVAL_MS").unwrap_or(1_000),
            probe_timeout_ms: env_parse("ENGINE_PROBE_TIMEOUT_MS").unwrap_or(2_000),
            request_timeout_ms: env_parse("VOICEVOX_REQUEST_TIMEOUT_MS").unwrap_or(30_000),
            probe_cache_ms: env_parse("ENGINE_PROBE_CACHE_MS").unwrap_or(0),
            player_command: env_string("PLAYER_COMMAND")
                .map(|s| split_command(&s))
                .unwrap_or_else(|| owned(DEFAULT_PLAYER)),
            tool_call_timeout_ms: env_parse("TOOL_CALL_TIMEOUT_MS").unwrap_or(0),
        }
    }
}

impl SpeechConfig {
    /// Load configuration from a TOML file (path via VVMCP_CONFIG or ./vvmcp.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("VVMCP_CONFIG").unwrap_or_else(|_| "vvmcp.toml".into());
        Self::load_from(Path::new(&path))
    }

    /// Same as [`SpeechConfig::load`] with an explicit file path
    pub fn load_from(path: &Path) -> Self {
        let default = Self::default();
        if !path.exists() {
            tracing::info!(target: "config", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match Self::overlay_toml(default.clone(), &s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "config", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Apply a TOML document on top of `base`
    pub fn overlay_toml(base: Self, raw: &str) -> crate::Result<Self> {
        let parsed: SpeechToml =
            toml::from_str(raw).map_err(|e| crate::VoxError::Config(e.to_string()))?;
        Ok(parsed.overlay(base))
    }

    pub fn launch_policy(&self) -> LaunchPolicy {
        LaunchPolicy {
            auto_start: self.auto_start,
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            probe_cache_ttl: Duration::from_millis(self.probe_cache_ms),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Registry call budget; `None` when unbounded
    pub fn tool_call_timeout(&self) -> Option<Duration> {
        match self.tool_call_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Human-readable start command for remediation messages
    pub fn start_command_line(&self) -> String {
        self.start_command.join(" ")
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
struct SpeechToml {
    pub engine: Option<EngineToml>,
    pub speech: Option<VoiceToml>,
    pub player: Option<PlayerToml>,
}

impl SpeechToml {
    fn overlay(self, mut base: SpeechConfig) -> SpeechConfig {
        if let Some(e) = self.engine {
            e.apply(&mut base);
        }
        if let Some(s) = self.speech {
            s.apply(&mut base);
        }
        if let Some(p) = self.player {
            p.apply(&mut base);
        }
        base
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EngineToml {
    pub url: Option<String>,
    pub auto_start: Option<bool>,
    pub start_command: Option<Vec<String>>,
    pub project_dir: Option<PathBuf>,
    pub compose_file: Option<String>,
    pub startup_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub probe_cache_ms: Option<u64>,
}
impl EngineToml {
    fn apply(self, c: &mut SpeechConfig) {
        if let Some(v) = self.url {
            c.engine_url = v;
        }
        if let Some(v) = self.auto_start {
            c.auto_start = v;
        }
        if let Some(v) = self.start_command.filter(|v| !v.is_empty()) {
            c.start_command = v;
        }
        if let Some(v) = self.project_dir {
            c.project_dir = v;
        }
        if let Some(v) = self.compose_file {
            c.compose_file = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = self.startup_timeout_ms {
            c.startup_timeout_ms = v;
        }
        if let Some(v) = self.poll_interval_ms {
            c.poll_interval_ms = v;
        }
        if let Some(v) = self.probe_timeout_ms {
            c.probe_timeout_ms = v;
        }
        if let Some(v) = self.request_timeout_ms {
            c.request_timeout_ms = v;
        }
        if let Some(v) = self.probe_cache_ms {
            c.probe_cache_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct VoiceToml {
    pub default_speaker: Option<u32>,
    pub tool_call_timeout_ms: Option<u64>,
}
impl VoiceToml {
    fn apply(self, c: &mut SpeechConfig) {
        if let Some(v) = self.default_speaker {
            c.default_speaker = v;
        }
        if let Some(v) = self.tool_call_timeout_ms {
            c.tool_call_timeout_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlayerToml {
    pub command: Option<Vec<String>>,
}
impl PlayerToml {
    fn apply(self, c: &mut SpeechConfig) {
        if let Some(v) = self.command.filter(|v| !v.is_empty()) {
            c.player_command = v;
        }
    }
}
