//! ElevenLabs text-to-speech client.
//!
//! Optional: when disabled in the configuration every call returns
//! [`TtsError::Disabled`] without touching the network, so callers can wire
//! it unconditionally.  Synthesis failures are never fatal to a session —
//! callers log them and fall back to text-only feedback.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;

use crate::config::TtsConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// Synthesis is switched off in the configuration.
    #[error("text-to-speech is disabled")]
    Disabled,

    /// Enabled but no API key configured.
    #[error("no text-to-speech API key configured")]
    MissingApiKey,

    /// The account's character quota is exhausted.
    #[error("text-to-speech quota exceeded")]
    QuotaExceeded,

    /// Any other synthesis failure: network, timeout, or a non-success
    /// response from the service.
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// Writing the audio file failed.
    #[error("could not write audio file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        TtsError::Synthesis(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer
// ---------------------------------------------------------------------------

/// Builds the streaming synthesis endpoint for a voice.
fn synthesis_url(base_url: &str, voice_id: &str) -> String {
    format!(
        "{}/v1/text-to-speech/{voice_id}/stream",
        base_url.trim_end_matches('/')
    )
}

/// Request body for a synthesis call.  Voice settings are fixed at values
/// that keep coaching feedback even-toned across turns.
fn synthesis_body(text: &str, model_id: &str) -> serde_json::Value {
    json!({
        "text": text,
        "model_id": model_id,
        "voice_settings": {
            "stability": 0.5,
            "similarity_boost": 0.75,
        },
    })
}

/// Client for turning feedback text into playable audio.
pub struct SpeechSynthesizer {
    config: TtsConfig,
    client: reqwest::Client,
}

impl SpeechSynthesizer {
    pub fn new(config: TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Synthesize `text` and return the encoded audio (MP3).
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        if !self.config.enabled {
            return Err(TtsError::Disabled);
        }
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(TtsError::MissingApiKey)?;

        let url = synthesis_url(&self.config.base_url, &self.config.voice_id);
        log::debug!("synthesizing {} chars via {url}", text.len());

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .json(&synthesis_body(text, &self.config.model_id))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || body.contains("quota_exceeded") {
                return Err(TtsError::QuotaExceeded);
            }
            return Err(TtsError::Synthesis(format!(
                "service returned {status}: {body}"
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Synthesize `text` and store the audio under `dir`, returning the
    /// written path.  The directory is created when missing; filenames carry
    /// a timestamp plus a random suffix so repeated turns never collide.
    pub async fn synthesize_to_file(&self, text: &str, dir: &Path) -> Result<PathBuf, TtsError> {
        let audio = self.synthesize(text).await?;

        tokio::fs::create_dir_all(dir).await?;
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let path = dir.join(format!("feedback-{stamp}-{}.mp3", &suffix[..8]));

        tokio::fs::write(&path, &audio).await?;
        log::info!("feedback audio written to {}", path.display());
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
