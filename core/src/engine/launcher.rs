/// Engine launcher and supervisor
///
/// `EngineSupervisor::ensure_running` is the only entry point the service uses:
/// probe, optionally start, then poll until ready or the startup budget is spent.
use super::probe::EngineProbe;
use super::EngineError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Strategy that brings the engine up in the background
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineStarter: Send + Sync {
    /// Launch the engine; returns once the launch command has completed
    async fn start(&self) -> Result<(), EngineError>;

    /// Command line shown to users in remediation messages
    fn describe(&self) -> String;
}

/// Runs an external command (default `docker compose up -d`) in a project directory
#[derive(Debug, Clone)]
pub struct CommandStarter {
    command: Vec<String>,
    cwd: PathBuf,
    required_file: Option<PathBuf>,
}

impl CommandStarter {
    pub fn new(command: Vec<String>, cwd: PathBuf) -> Self {
        Self {
            command,
            cwd,
            required_file: None,
        }
    }

    /// Refuse to launch unless `cwd/name` exists (e.g. the compose file)
    pub fn require_file(mut self, name: impl Into<PathBuf>) -> Self {
        self.required_file = Some(self.cwd.join(name.into()));
        self
    }

    fn fail(&self, reason: String) -> EngineError {
        EngineError::LaunchFailed {
            reason,
            hint: self.describe(),
        }
    }
}

#[async_trait]
impl EngineStarter for CommandStarter {
    async fn start(&self) -> Result<(), EngineError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| self.fail("start command is empty".to_string()))?;

        if let Some(ref required) = self.required_file {
            if !required.exists() {
                warn!(target: "engine_launcher", file = %required.display(), "Required file missing; skipping auto-start");
                return Err(self.fail(format!("{} not found", required.display())));
            }
        }

        info!(
            target: "engine_launcher",
            command = %self.describe(),
            cwd = %self.cwd.display(),
            "Launching engine"
        );

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                error!(target: "engine_launcher", error = %e, program = %program, "Failed to spawn start command");
                if e.kind() == std::io::ErrorKind::NotFound {
                    self.fail(format!("`{}` command not found", program))
                } else {
                    self.fail(format!("failed to run `{}`: {}", program, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            error!(target: "engine_launcher", code = %code, stderr = %stderr.trim(), "Start command failed");
            return Err(self.fail(format!(
                "start command exited with {}: {}",
                code,
                stderr.trim()
            )));
        }

        debug!(target: "engine_launcher", "Start command completed");
        Ok(())
    }

    fn describe(&self) -> String {
        self.command.join(" ")
    }
}

/// Auto-start and polling knobs, derived from `SpeechConfig`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchPolicy {
    pub auto_start: bool,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
    /// Reuse a positive probe for this long (zero = always probe)
    pub probe_cache_ttl: Duration,
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self {
            auto_start: true,
            startup_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            probe_cache_ttl: Duration::ZERO,
        }
    }
}

/// Makes sure the engine answers before a request is dispatched
pub struct EngineSupervisor {
    endpoint: String,
    probe: Arc<dyn EngineProbe>,
    starter: Arc<dyn EngineStarter>,
    policy: LaunchPolicy,
    last_ok: Mutex<Option<Instant>>,
}

impl EngineSupervisor {
    pub fn new(
        endpoint: impl Into<String>,
        probe: Arc<dyn EngineProbe>,
        starter: Arc<dyn EngineStarter>,
        policy: LaunchPolicy,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            probe,
            starter,
            policy,
            last_ok: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &LaunchPolicy {
        &self.policy
    }

    /// Probe; start and wait if needed. Idempotent when the engine is up.
    pub async fn ensure_running(&self) -> Result<(), EngineError> {
        if self.cached_ok() {
            debug!(target: "engine_launcher", "Using cached reachability");
            return Ok(());
        }

        if self.probe.is_reachable().await {
            self.mark_ok();
            return Ok(());
        }

        if !self.policy.auto_start {
            warn!(target: "engine_launcher", url = %self.endpoint, "Engine unreachable and auto-start disabled");
            return Err(EngineError::Unreachable {
                url: self.endpoint.clone(),
                hint: self.starter.describe(),
            });
        }

        info!(target: "engine_launcher", url = %self.endpoint, "VOICEVOX Engine not running, starting...");
        // A hung start command is dropped (and killed) once the startup budget runs out
        match tokio::time::timeout(self.policy.startup_timeout, self.starter.start()).await {
            Ok(started) => started?,
            Err(_) => {
                let budget_ms = self.policy.startup_timeout.as_millis() as u64;
                warn!(target: "engine_launcher", budget_ms = budget_ms, "Start command did not finish in time");
                return Err(EngineError::LaunchFailed {
                    reason: format!("start command did not finish within {} ms", budget_ms),
                    hint: self.starter.describe(),
                });
            }
        }

        let deadline = Instant::now() + self.policy.startup_timeout;
        self.wait_until_ready(deadline).await
    }

    /// Poll the probe every `poll_interval` until it answers or `deadline` passes.
    /// Dropping the returned future stops polling.
    pub async fn wait_until_ready(&self, deadline: Instant) -> Result<(), EngineError> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline {
                let waited_ms = now.duration_since(started).as_millis() as u64;
                warn!(
                    target: "engine_launcher",
                    url = %self.endpoint,
                    attempts = attempts,
                    waited_ms = waited_ms,
                    "Engine did not become ready in time"
                );
                return Err(EngineError::StartupTimeout {
                    url: self.endpoint.clone(),
                    waited_ms,
                    hint: self.starter.describe(),
                });
            }

            sleep(self.policy.poll_interval.min(deadline - now)).await;
            attempts += 1;

            if self.probe.is_reachable().await {
                info!(target: "engine_launcher", attempts = attempts, "VOICEVOX Engine started successfully");
                self.mark_ok();
                return Ok(());
            }
            debug!(target: "engine_launcher", attempts = attempts, "Engine not ready yet");
        }
    }

    fn cached_ok(&self) -> bool {
        if self.policy.probe_cache_ttl.is_zero() {
            return false;
        }
        match self.last_ok.lock() {
            Ok(guard) => guard
                .map(|at| at.elapsed() < self.policy.probe_cache_ttl)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn mark_ok(&self) {
        if self.policy.probe_cache_ttl.is_zero() {
            return;
        }
        if let Ok(mut guard) = self.last_ok.lock() {
            *guard = Some(Instant::now());
        }
    }
}
