//! Evaluation result types.

use crate::error::ConditionError;
use chrono::{DateTime, Utc};
use hub_policy::{Channel, PolicyConfig, PolicyId, PolicyType, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A policy that fired on a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringEvent {
    /// Policy that fired.
    pub policy_id: PolicyId,
    /// Policy name at firing time.
    pub policy_name: String,
    /// Policy type.
    pub policy_type: PolicyType,
    /// Trigger severity (monitoring policies only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Snapshot timestamp.
    pub timestamp: DateTime<Utc>,
    /// Channels to notify.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub channels: BTreeSet<Channel>,
    /// Type-specific action payload.
    pub config: PolicyConfig,
}

/// A condition problem attached to a policy outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFault {
    /// Index of the condition; `None` for policy-level faults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<usize>,
    /// What went wrong.
    pub error: ConditionError,
}

/// What happened to one policy on one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PolicyStatus {
    /// Policy is disabled and was skipped.
    Disabled,
    /// No condition is breaching.
    Idle,
    /// Some condition is breaching but the policy has not fired.
    Breaching,
    /// Policy fired.
    Firing,
    /// A condition could not be compiled; the policy cannot fire.
    ConfigError {
        /// Compile failures.
        faults: Vec<ConditionFault>,
    },
    /// A sample did not match its condition's type on this tick.
    EvaluationError {
        /// Per-condition failures.
        faults: Vec<ConditionFault>,
    },
}

impl PolicyStatus {
    /// Returns the faults of an error status.
    #[must_use]
    pub fn faults(&self) -> &[ConditionFault] {
        match self {
            Self::ConfigError { faults } | Self::EvaluationError { faults } => faults,
            _ => &[],
        }
    }

    /// Returns true for `ConfigError` and `EvaluationError`.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. } | Self::EvaluationError { .. })
    }
}

/// Outcome of one policy on one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Evaluated policy.
    pub policy_id: PolicyId,
    /// Policy type.
    pub policy_type: PolicyType,
    /// Result.
    #[serde(flatten)]
    pub status: PolicyStatus,
}

/// Result of evaluating a policy set against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Snapshot timestamp.
    pub timestamp: DateTime<Utc>,
    /// Fired policies in execution order.
    pub events: Vec<FiringEvent>,
    /// One outcome per policy, in execution order.
    pub outcomes: Vec<PolicyOutcome>,
}

impl TickReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            events: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Ids of fired policies in execution order.
    #[must_use]
    pub fn fired_ids(&self) -> Vec<&PolicyId> {
        self.events.iter().map(|e| &e.policy_id).collect()
    }

    /// Outcomes with an error status.
    pub fn errors(&self) -> impl Iterator<Item = &PolicyOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_error())
    }

    /// Returns true if any policy reported an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Outcome for a policy.
    #[must_use]
    pub fn outcome(&self, id: &PolicyId) -> Option<&PolicyOutcome> {
        self.outcomes.iter().find(|o| &o.policy_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hub_policy::{Metric, Operator};

    #[test]
    fn outcome_serializes_flat() {
        let outcome = PolicyOutcome {
            policy_id: PolicyId::from("slow"),
            policy_type: PolicyType::Monitoring,
            status: PolicyStatus::ConfigError {
                faults: vec![ConditionFault {
                    condition: Some(0),
                    error: ConditionError::UnsupportedOperator {
                        metric: Metric::ResponseTime,
                        operator: Operator::Contains,
                    },
                }],
            },
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "config_error");
        assert_eq!(json["policy_type"], "monitoring");
        assert_eq!(json["faults"][0]["error"]["kind"], "unsupported_operator");
        assert_eq!(json["faults"][0]["condition"], 0);
    }

    #[test]
    fn error_outcomes_are_listed() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let mut report = TickReport::new(timestamp);
        report.outcomes.push(PolicyOutcome {
            policy_id: PolicyId::from("a"),
            policy_type: PolicyType::Caching,
            status: PolicyStatus::Idle,
        });
        assert!(!report.has_errors());

        report.outcomes.push(PolicyOutcome {
            policy_id: PolicyId::from("b"),
            policy_type: PolicyType::Monitoring,
            status: PolicyStatus::EvaluationError { faults: Vec::new() },
        });
        assert!(report.has_errors());
        assert_eq!(report.errors().count(), 1);
        assert_eq!(
            report.outcome(&PolicyId::from("b")).map(|o| o.policy_type),
            Some(PolicyType::Monitoring)
        );
    }
}
