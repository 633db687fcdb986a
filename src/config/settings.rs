//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Tutoring instructions sent in the transport setup handshake.
///
/// The model is asked for labeled sections so the feedback parser can split
/// its reply by keyword — see `session::feedback`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a professional spoken-English tutor. The user will speak a sentence \
in English. Reply with the following labeled sections, one per line:\n\
Recognition: (the sentence you heard)\n\
Grammar: (grammatical issues, if any)\n\
Pronunciation: (pronunciation issues, if any)\n\
Suggestions: (concrete improvements)\n\
Next practice: (a follow-up sentence for the user to try)";

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

/// Settings for the bidirectional streaming connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Host of the model-serving endpoint.
    pub host: String,
    /// Model identifier declared in the setup handshake.
    pub model: String,
    /// API key appended as a query parameter — `None` until configured.
    pub api_key: Option<String>,
    /// System prompt declared in the setup handshake.
    pub system_prompt: String,
    /// Seconds to wait for the handshake acknowledgment before giving up.
    pub connect_timeout_secs: u64,
    /// Total connection attempts per establishment cycle.
    pub max_attempts: u32,
    /// Backoff unit in milliseconds; the wait after attempt `n` is `n × backoff_ms`.
    pub backoff_ms: u64,
    /// Capacity of the pending-frame queue (oldest frames drop on overflow).
    pub queue_frames: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "generativelanguage.googleapis.com".into(),
            model: "models/gemini-2.0-flash-exp".into(),
            api_key: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            connect_timeout_secs: 10,
            max_attempts: 3,
            backoff_ms: 1_000,
            queue_frames: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture and framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate delivered to the transport in Hz (fixed at 16 000).
    pub sample_rate: u32,
    /// Samples per outbound PCM frame.
    pub frame_samples: usize,
    /// Maximum recording length in seconds before the caller should stop.
    pub max_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_samples: 512,
            max_recording_secs: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the spoken-feedback synthesis step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Whether spoken feedback is synthesized at all.
    pub enabled: bool,
    /// API key sent in the `xi-api-key` header — `None` disables synthesis.
    pub api_key: Option<String>,
    /// Base URL of the synthesis API.
    pub base_url: String,
    /// Voice identifier used in the request path.
    pub voice_id: String,
    /// Synthesis model identifier.
    pub model_id: String,
    /// Maximum seconds to wait for a synthesis response.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: "https://api.elevenlabs.io".into(),
            voice_id: "nPczCjzI2devNBz1zQrb".into(),
            model_id: "eleven_flash_v2_5".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use talkcoach::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Streaming-transport settings.
    pub transport: TransportConfig,
    /// Audio capture / framing settings.
    pub audio: AudioConfig,
    /// Spoken-feedback synthesis settings.
    pub tts: TtsConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
