use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::query::AudioQuery;
use super::SynthesisError;
use crate::params::SynthesisRequest;

/// One style of a VOICEVOX character; `id` is the speaker id used for synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerStyle {
    pub name: String,
    pub id: u32,
}

/// Entry of `GET /speakers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    #[serde(default)]
    pub speaker_uuid: Option<String>,
    #[serde(default)]
    pub styles: Vec<SpeakerStyle>,
}

/// Anything that can turn a validated request into WAV bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Two-stage synthesis: audio query, then waveform
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError>;

    /// Characters and styles the engine offers
    async fn speakers(&self) -> Result<Vec<Speaker>, SynthesisError>;
}

/// HTTP client for a VOICEVOX Engine
#[derive(Clone)]
pub struct VoicevoxClient {
    base_url: String,
    http: Client,
}

/// Keep upstream error bodies short in messages
const MAX_BODY_CHARS: usize = 200;

impl VoicevoxClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stage 1: `POST /audio_query?text=&speaker=`
    pub async fn audio_query(&self, request: &SynthesisRequest) -> Result<AudioQuery, SynthesisError> {
        let url = format!("{}/audio_query", self.base_url);
        debug!(target: "voicevox_client", url = %url, speaker = request.speaker_id(), "Requesting audio query");

        let fail = |status: Option<u16>, message: String| SynthesisError::QueryFailed { status, message };

        let response = self
            .http
            .post(&url)
            .query(&[("text", request.text())])
            .query(&[("speaker", request.speaker_id())])
            .send()
            .await
            .map_err(|e| {
                warn!(target: "voicevox_client", error = %e, "Audio query request failed");
                fail(None, describe_transport_error(&e, &self.base_url))
            })?;

        let response = check_status(response).await.map_err(|(s, m)| fail(Some(s), m))?;

        response.json::<AudioQuery>().await.map_err(|e| {
            warn!(target: "voicevox_client", error = %e, "Malformed audio query");
            fail(None, format!("malformed audio query: {}", e))
        })
    }

    /// Stage 2: `POST /synthesis?speaker=` with the (modified) query as body
    pub async fn synthesis(
        &self,
        query: &AudioQuery,
        speaker_id: u32,
    ) -> Result<Vec<u8>, SynthesisError> {
        let url = format!("{}/synthesis", self.base_url);
        debug!(target: "voicevox_client", url = %url, speaker = speaker_id, "Requesting synthesis");

        let fail =
            |status: Option<u16>, message: String| SynthesisError::SynthesisFailed { status, message };

        let response = self
            .http
            .post(&url)
            .query(&[("speaker", speaker_id)])
            .json(query)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "voicevox_client", error = %e, "Synthesis request failed");
                fail(None, describe_transport_error(&e, &self.base_url))
            })?;

        let response = check_status(response).await.map_err(|(s, m)| fail(Some(s), m))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fail(None, format!("failed to read waveform: {}", e)))?;

        debug!(target: "voicevox_client", bytes = bytes.len(), "Synthesis complete");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SynthesisBackend for VoicevoxClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let mut query = self.audio_query(request).await?;
        query.apply(request);
        self.synthesis(&query, request.speaker_id()).await
    }

    async fn speakers(&self) -> Result<Vec<Speaker>, SynthesisError> {
        let url = format!("{}/speakers", self.base_url);
        debug!(target: "voicevox_client", url = %url, "Listing speakers");

        let fail =
            |status: Option<u16>, message: String| SynthesisError::SpeakersFailed { status, message };

        let response = self.http.get(&url).send().await.map_err(|e| {
            warn!(target: "voicevox_client", error = %e, "Speaker listing failed");
            fail(None, describe_transport_error(&e, &self.base_url))
        })?;

        let response = check_status(response).await.map_err(|(s, m)| fail(Some(s), m))?;

        response
            .json::<Vec<Speaker>>()
            .await
            .map_err(|e| fail(None, format!("malformed speaker list: {}", e)))
    }
}

/// Pass successful responses through; turn the rest into (status, body excerpt)
async fn check_status(response: Response) -> Result<Response, (u16, String)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    warn!(target: "voicevox_client", status = %status, "Engine returned error");
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.trim().chars().take(MAX_BODY_CHARS).collect();
    let message = if excerpt.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("upstream error")
            .to_string()
    } else {
        excerpt
    };
    Err((status.as_u16(), message))
}

fn describe_transport_error(e: &reqwest::Error, base_url: &str) -> String {
    if e.is_connect() {
        format!(
            "cannot connect to VOICEVOX Engine ({}); check that the container is running",
            base_url
        )
    } else if e.is_timeout() {
        format!("VOICEVOX Engine ({}) timed out", base_url)
    } else {
        e.to_string()
    }
}
