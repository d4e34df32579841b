//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use voxcard_core::{AudioEncoding, Pace};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Speech provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Question/answer pacing configuration
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Audio output configuration
    #[serde(default)]
    pub audio: AudioConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings. Credential checks are fail-fast: a
    /// credential-requiring backend without a key refuses to start
    /// rather than failing every request later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.backend.requires_credential()
            && self
                .provider
                .api_key
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(ConfigError::MissingCredential {
                backend: self.provider.backend.as_str().to_string(),
            });
        }

        if self.pacing.gap_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pacing.gap_ms".to_string(),
                message: "interstitial gap must be at least 1ms".to_string(),
            });
        }
        if self.pacing.lead_silence_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "pacing.lead_silence_ms".to_string(),
                message: "leading silence must be at least 1ms (or omitted)".to_string(),
            });
        }

        if !(8_000..=48_000).contains(&self.audio.sample_rate) {
            return Err(ConfigError::InvalidValue {
                field: "audio.sample_rate".to_string(),
                message: format!("{} Hz is outside 8000..=48000", self.audio.sample_rate),
            });
        }
        if self.audio.channels == 0 || self.audio.channels > 2 {
            return Err(ConfigError::InvalidValue {
                field: "audio.channels".to_string(),
                message: "only mono and stereo output are supported".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Base URL prepended to artifact paths in responses. When unset,
    /// responses carry a relative `/static/audio/...` path.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
            public_base_url: None,
        }
    }
}

/// Available speech provider backends. Bound once at startup; never
/// selected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    /// Cloud REST synthesis API
    Remote,
    /// Bundled neural model loaded into process memory
    Offline,
    /// Chunked-transfer streaming synthesis API
    Streaming,
    /// OS-level speech engine (espeak)
    Local,
    /// Deterministic tone generator for development and tests
    Stub,
}

impl ProviderBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderBackend::Remote => "remote",
            ProviderBackend::Offline => "offline",
            ProviderBackend::Streaming => "streaming",
            ProviderBackend::Local => "local",
            ProviderBackend::Stub => "stub",
        }
    }

    pub fn requires_credential(&self) -> bool {
        matches!(self, ProviderBackend::Remote | ProviderBackend::Streaming)
    }
}

/// Speech provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend to bind at startup
    #[serde(default = "default_backend")]
    pub backend: ProviderBackend,

    /// API key for remote/streaming backends. Prefer the
    /// VOXCARD__PROVIDER__API_KEY environment variable over files.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Remote API base endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Remote model identifier
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Voice id used for male requests on remote backends
    #[serde(default = "default_voice_male")]
    pub voice_male: String,

    /// Voice id used for female requests on remote backends
    #[serde(default = "default_voice_female")]
    pub voice_female: String,

    /// Path to the offline synthesis model
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Language prefix for local-engine voice matching
    #[serde(default = "default_language")]
    pub language: String,

    /// Per-call timeout for network-bound providers, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> ProviderBackend {
    ProviderBackend::Remote
}
fn default_endpoint() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}
fn default_voice_male() -> String {
    "pNInz6obpgDQGcFmaJgB".to_string()
}
fn default_voice_female() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}
fn default_model_path() -> String {
    "models/tts/voice.onnx".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_key: None,
            endpoint: default_endpoint(),
            model_id: default_model_id(),
            voice_male: default_voice_male(),
            voice_female: default_voice_female(),
            model_path: default_model_path(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Pacing configuration for the question/answer artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Optional silence before the question
    #[serde(default)]
    pub lead_silence_ms: Option<u64>,

    /// Silence between question and answer
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u64,

    /// Pace for the question reading
    #[serde(default)]
    pub question_pace: Pace,

    /// Pace for the answer reading
    #[serde(default = "default_answer_pace")]
    pub answer_pace: Pace,
}

fn default_gap_ms() -> u64 {
    2000
}
fn default_answer_pace() -> Pace {
    Pace::Slow
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            lead_silence_ms: None,
            gap_ms: default_gap_ms(),
            question_pace: Pace::Normal,
            answer_pace: default_answer_pace(),
        }
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Flat directory where artifacts are stored
    #[serde(default = "default_audio_dir")]
    pub dir: String,

    /// Working sample rate segments are normalized to
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Working channel count
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Delivery encoding. `mp3` requires ffmpeg on PATH.
    #[serde(default)]
    pub encoding: AudioEncoding,

    /// Target bitrate for lossy encoding, in kbit/s
    #[serde(default = "default_bitrate")]
    pub bitrate_kbps: u32,
}

fn default_audio_dir() -> String {
    "static/audio".to_string()
}
fn default_sample_rate() -> u32 {
    22050
}
fn default_channels() -> u16 {
    1
}
fn default_bitrate() -> u32 {
    128
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            dir: default_audio_dir(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            encoding: AudioEncoding::default(),
            bitrate_kbps: default_bitrate(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs instead of the pretty format
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (VOXCARD__ prefix, `__` separator)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOXCARD")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.pacing.gap_ms, 2000);
        assert_eq!(settings.audio.sample_rate, 22050);
        assert_eq!(settings.provider.backend, ProviderBackend::Remote);
    }

    #[test]
    fn remote_backend_without_key_fails_validation() {
        let settings = Settings::default();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingCredential { .. })
        ));
    }

    #[test]
    fn stub_backend_needs_no_credential() {
        let mut settings = Settings::default();
        settings.provider.backend = ProviderBackend::Stub;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_gap_is_rejected() {
        let mut settings = Settings::default();
        settings.provider.backend = ProviderBackend::Stub;
        settings.pacing.gap_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
