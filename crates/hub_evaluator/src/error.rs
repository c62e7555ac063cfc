//! Error types for evaluation.

use chrono::{DateTime, Utc};
use hub_policy::{Metric, Operator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a condition cannot be evaluated.
///
/// These never abort a tick: they are recorded against the owning policy and
/// the condition fails closed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionError {
    /// Threshold cannot be read as the operator requires.
    #[error("malformed value '{value}' for {operator}: expected {expected}")]
    MalformedValue {
        /// Threshold as configured.
        value: String,
        /// Operator needing the threshold.
        operator: Operator,
        /// What the threshold should look like.
        expected: String,
    },

    /// Operator does not apply to the metric's declared type.
    #[error("operator {operator} is not supported for metric {metric}")]
    UnsupportedOperator {
        /// Metric of the condition.
        metric: Metric,
        /// Rejected operator.
        operator: Operator,
    },

    /// Sample has the wrong type for the compiled threshold.
    #[error("sample for {metric} must be {expected}, found '{found}'")]
    SampleType {
        /// Metric the sample belongs to.
        metric: Metric,
        /// Expected sample type.
        expected: String,
        /// Offending sample.
        found: String,
    },

    /// A trigger needs at least one condition.
    #[error("monitoring policy has no conditions")]
    NoConditions,
}

/// Errors returned by evaluator entry points.
#[derive(Debug, Error)]
pub enum Error {
    /// Snapshot is older than the last evaluated tick for this store.
    #[error("stale snapshot at {snapshot}, last tick was {last}")]
    StaleSnapshot {
        /// Snapshot timestamp.
        snapshot: DateTime<Utc>,
        /// Timestamp of the last evaluated tick.
        last: DateTime<Utc>,
    },
}

/// Result type alias for evaluator operations.
pub type Result<T> = std::result::Result<T, Error>;
