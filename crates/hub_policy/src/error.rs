//! Error types for policy parsing, loading and editing.

use thiserror::Error;

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to parse TOON syntax.
    #[error("parse error at line {line}: {reason}")]
    Parse {
        /// Line number where the error occurred.
        line: usize,
        /// Reason for the parse failure.
        reason: String,
    },

    /// Array count mismatch (strict mode).
    #[error("count mismatch: declared {declared}, found {actual}")]
    CountMismatch {
        /// Declared count in the TOON header.
        declared: usize,
        /// Actual number of items found.
        actual: usize,
    },

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Condition text does not follow `metric operator value [for Nm]`.
    #[error("invalid condition '{condition}': {reason}")]
    InvalidCondition {
        /// The invalid condition text.
        condition: String,
        /// Reason why the condition is invalid.
        reason: String,
    },

    /// Policy configuration payload does not fit its policy type.
    #[error("invalid {policy_type} config: {reason}")]
    InvalidConfig {
        /// Policy type the payload was parsed for.
        policy_type: String,
        /// Reason why the payload is invalid.
        reason: String,
    },

    /// A policy with the same id already exists in the set.
    #[error("duplicate policy id: {0}")]
    DuplicatePolicy(String),

    /// Two endpoints in one document share a path.
    #[error("duplicate endpoint path: {0}")]
    DuplicateEndpoint(String),

    /// No policy with the given id exists in the set.
    #[error("unknown policy id: {0}")]
    UnknownPolicy(String),

    /// File extension is not a known document format.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// I/O error while reading a document.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML document error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// JSON document error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, Error>;
