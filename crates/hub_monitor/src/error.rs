//! Error types for monitoring.

use thiserror::Error;

/// Errors that can occur while ingesting samples or running the monitor.
#[derive(Debug, Error)]
pub enum Error {
    /// A sample could not be decoded.
    #[error("{format} decode error: {reason}")]
    Decode {
        /// Decoder that failed.
        format: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// No decoder accepts the input.
    #[error("unknown sample format: {0}")]
    UnknownFormat(String),

    /// Monitor configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker or dispatcher task stopped unexpectedly.
    #[error("task failed: {0}")]
    Task(String),

    /// Policy document error.
    #[error(transparent)]
    Policy(#[from] hub_policy::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parse error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a decode error.
    pub fn decode(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            format,
            reason: reason.into(),
        }
    }
}

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, Error>;
