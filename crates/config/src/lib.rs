//! Configuration for the voxcard service
//!
//! Settings are layered: `config/default.yaml`, then an optional
//! environment-specific file, then `VOXCARD__`-prefixed environment
//! variables. Provider credentials are validated once at startup;
//! a missing credential for a credential-requiring backend is a fatal
//! startup condition, not a per-request error.

mod settings;

pub use settings::{
    load_settings, AudioConfig, ObservabilityConfig, PacingConfig, ProviderBackend,
    ProviderConfig, ServerConfig, Settings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("provider backend '{backend}' requires an API key (set VOXCARD__PROVIDER__API_KEY)")]
    MissingCredential { backend: String },
}
