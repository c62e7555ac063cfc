//! Error types for rendering and export.

use thiserror::Error;

/// Errors that can occur while rendering or exporting.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown output format or language name.
    #[error("unsupported {kind}: {name}")]
    Unsupported {
        /// What was being selected, e.g. "language".
        kind: &'static str,
        /// Rejected name.
        name: String,
    },

    /// Policy model error.
    #[error(transparent)]
    Policy(#[from] hub_policy::Error),

    /// I/O error reading or writing a lockfile.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML serialization error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, Error>;
