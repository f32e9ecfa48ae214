//! WAV playback through an external player process.
//!
//! The payload is streamed to the player's stdin (default
//! `ffplay -nodisp -autoexit -loglevel quiet -i pipe:0`), so nothing touches disk.
//! The child is always reaped: on success, on write failure, on non-zero exit,
//! and, through `kill_on_drop`, when the calling future is cancelled.

use crate::{Result, VoxError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play a complete WAV payload and wait until playback ends
    async fn play(&self, wav: &[u8]) -> Result<()>;
}

/// Player backed by an external command reading WAV from stdin
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| VoxError::Config("player command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, wav: &[u8]) -> Result<()> {
        debug!(target: "playback", program = %self.program, args = ?self.args, bytes = wav.len(), "Spawning player");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!(target: "playback", program = %self.program, error = %e, "Failed to spawn player");
                if e.kind() == std::io::ErrorKind::NotFound {
                    VoxError::Playback(format!(
                        "{} not found; install FFmpeg or set PLAYER_COMMAND",
                        self.program
                    ))
                } else {
                    VoxError::Playback(format!("failed to start {}: {}", self.program, e))
                }
            })?;

        let write_result = match child.stdin.take() {
            Some(mut stdin) => {
                let r = stdin.write_all(wav).await;
                let r = match r {
                    Ok(()) => stdin.shutdown().await,
                    Err(e) => Err(e),
                };
                // Close the pipe so the player sees EOF
                drop(stdin);
                r
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "player stdin not captured",
            )),
        };

        if let Err(ref e) = write_result {
            warn!(target: "playback", error = %e, "Failed to stream audio to player");
            let _ = child.start_kill();
        }

        let status = child
            .wait()
            .await
            .map_err(|e| VoxError::Playback(format!("failed to wait for {}: {}", self.program, e)))?;

        if let Err(e) = write_result {
            return Err(VoxError::Playback(format!(
                "failed to stream audio to {}: {}",
                self.program, e
            )));
        }

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            warn!(target: "playback", program = %self.program, code = %code, "Player exited with error");
            return Err(VoxError::Playback(format!(
                "audio playback failed (code: {})",
                code
            )));
        }

        info!(target: "playback", bytes = wav.len(), "Playback finished");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, extra: &[&str]) -> CommandPlayer {
        let mut cmd = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        cmd.extend(extra.iter().map(|s| s.to_string()));
        CommandPlayer::new(&cmd).unwrap()
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandPlayer::new(&[]).is_err());
    }

    #[tokio::test]
    async fn player_receives_payload_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("received.wav");
        let player = sh("cat > \"$0\"", &[out.to_str().unwrap()]);

        let payload = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
        player.play(&payload).await.unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), payload);
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_playback_error() {
        let player = sh("cat > /dev/null; exit 4", &[]);
        let err = player.play(b"RIFF").await.unwrap_err();
        assert_eq!(err.code(), "PLAYBACK_ERROR");
        assert!(err.to_string().contains("code: 4"));
    }

    #[tokio::test]
    async fn missing_player_is_a_playback_error() {
        let player = CommandPlayer::new(&["vvmcp-no-such-player-12345".to_string()]).unwrap();
        let err = player.play(b"RIFF").await.unwrap_err();
        assert_eq!(err.code(), "PLAYBACK_ERROR");
        assert!(err.to_string().contains("not found"));
    }
}
