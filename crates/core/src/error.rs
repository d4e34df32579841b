//! Error types for the voxcard service

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("stitch error: {0}")]
    Stitch(#[from] StitchError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Request validation errors. Surfaced as 4xx; a job that fails
/// validation never starts and has zero side effects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("text must not be empty")]
    EmptyText,

    #[error("'{0}' is required")]
    MissingField(&'static str),
}

/// Speech provider failures.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No credential was configured for a credential-requiring provider.
    /// Raised once at startup, never per request.
    #[error("no synthesis credential configured")]
    AuthMissing,

    /// The upstream service refused the request due to rate limiting.
    #[error("synthesis provider rate limited")]
    RateLimited,

    /// The provider completed without producing any audio. A zero-length
    /// segment is never treated as valid silence.
    #[error("synthesis provider returned empty audio")]
    EmptyOutput,

    /// Network or process-level failure reaching the provider.
    #[error("synthesis transport failure{}: {detail}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    TransportFailure {
        status: Option<u16>,
        detail: String,
    },

    /// The offline model failed to load; every call fails this way until
    /// the process is restarted.
    #[error("synthesis model unavailable: {0}")]
    ModelUnavailable(String),
}

/// Audio stitching and encoding failures.
#[derive(Error, Debug)]
pub enum StitchError {
    #[error("no segments to stitch")]
    Empty,

    #[error("incompatible segment format: {0}")]
    FormatMismatch(String),

    /// External codec missing or failed. Transport-class: reported as a
    /// server error, never a crash.
    #[error("codec failure: {0}")]
    Codec(String),
}

/// Artifact persistence failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cannot create audio directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write artifact {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}
