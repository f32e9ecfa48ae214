// Logging setup shared by the binaries
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "info,vvmcp_core=info,vvmcp_bridge=info";

/// Install a fmt subscriber writing to stderr.
///
/// stdout stays reserved for protocol traffic, so every log line must go to
/// stderr. `RUST_LOG` overrides `default_filter`. Calling this twice is an error
/// from the second subscriber install, which callers may ignore.
pub fn init_tracing(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    info!(target: "telemetry", "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_without_panicking() {
        let _ = init_tracing(DEFAULT_LOG_FILTER);
        assert!(init_tracing(DEFAULT_LOG_FILTER).is_err());
    }
}
