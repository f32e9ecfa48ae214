/// Engine availability probe
///
/// A probe answers one question: does the engine answer right now? Network
/// failures are a `false`, never an error.
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineProbe: Send + Sync {
    /// Single best-effort reachability check
    async fn is_reachable(&self) -> bool;
}

/// Probe that issues `GET {base_url}/version`
pub struct HttpProbe {
    version_url: String,
    http: reqwest::Client,
}

impl HttpProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            version_url: format!("{}/version", base_url.trim_end_matches('/')),
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.version_url
    }
}

#[async_trait]
impl EngineProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.http.get(&self.version_url).send().await {
            Ok(resp) => {
                let ok = resp.status() == reqwest::StatusCode::OK;
                debug!(target: "engine_probe", url = %self.version_url, status = %resp.status(), "Probe answered");
                ok
            }
            Err(e) => {
                debug!(target: "engine_probe", url = %self.version_url, error = %e, "Probe failed");
                false
            }
        }
    }
}
