//! Static validation of policy sets and endpoints.

use crate::checks;
use hub_policy::{EndpointDefinition, PolicyId, PolicySet};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Result of validating a policy set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Overall status.
    pub status: Status,
    /// Number of checks passed.
    pub checks_passed: usize,
    /// Total number of checks.
    pub checks_total: usize,
    /// Problems that prevent policies from working.
    pub violations: Vec<Violation>,
    /// Problems worth a look.
    pub warnings: Vec<Warning>,
}

/// Validation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Nothing found.
    Valid,
    /// Only warnings found.
    ValidWithWarnings,
    /// At least one violation.
    Invalid,
}

/// Finding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    /// Blocks the configuration.
    Critical,
    /// Noted but not blocking.
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::Warning => write!(f, "WARNING"),
        }
    }
}

/// A blocking finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Which check failed.
    pub check: String,
    /// Finding level.
    pub level: Level,
    /// Policy concerned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<PolicyId>,
    /// Human-readable message.
    pub message: String,
}

/// A non-blocking finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Which check produced the warning.
    pub check: String,
    /// Finding level.
    pub level: Level,
    /// Policy concerned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<PolicyId>,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    /// Creates a critical violation.
    #[must_use]
    pub fn critical(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            level: Level::Critical,
            policy_id: None,
            message: message.into(),
        }
    }

    /// Attaches the policy concerned.
    #[must_use]
    pub fn for_policy(mut self, id: &PolicyId) -> Self {
        self.policy_id = Some(id.clone());
        self
    }
}

impl Warning {
    /// Creates a warning.
    #[must_use]
    pub fn new(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            level: Level::Warning,
            policy_id: None,
            message: message.into(),
        }
    }

    /// Attaches the policy concerned.
    #[must_use]
    pub fn for_policy(mut self, id: &PolicyId) -> Self {
        self.policy_id = Some(id.clone());
        self
    }
}

impl ValidationReport {
    fn from_findings(
        checks_total: usize,
        failed_checks: usize,
        violations: Vec<Violation>,
        warnings: Vec<Warning>,
    ) -> Self {
        let status = if !violations.is_empty() {
            Status::Invalid
        } else if warnings.is_empty() {
            Status::Valid
        } else {
            Status::ValidWithWarnings
        };
        Self {
            status,
            checks_passed: checks_total - failed_checks,
            checks_total,
            violations,
            warnings,
        }
    }

    /// Returns true unless there are violations.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.status, Status::Valid | Status::ValidWithWarnings)
    }

    /// Returns true if there are violations.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self.status, Status::Invalid)
    }
}

/// Runs every policy-set check.
#[must_use]
pub fn validate(set: &PolicySet) -> ValidationReport {
    let names = checks::check_names(set);
    let conditions = checks::check_conditions(set);
    let channels = checks::check_channels(set);
    let ties = checks::check_priority_ties(set);

    let failed = [names.is_empty(), conditions.is_empty(), channels.is_empty(), ties.is_empty()]
        .iter()
        .filter(|passed| !**passed)
        .count();

    let mut violations = names;
    violations.extend(conditions);
    let mut warnings = channels;
    warnings.extend(ties);

    let report = ValidationReport::from_findings(4, failed, violations, warnings);
    debug!(
        policies = set.len(),
        violations = report.violations.len(),
        warnings = report.warnings.len(),
        "validated policy set"
    );
    report
}

/// Validates an endpoint definition and its policy set.
#[must_use]
pub fn validate_endpoint(endpoint: &EndpointDefinition) -> ValidationReport {
    let mut report = validate(&endpoint.policies);
    let endpoint_violations = checks::check_endpoint(endpoint);

    let failed = report.checks_total - report.checks_passed + usize::from(!endpoint_violations.is_empty());
    let mut violations = endpoint_violations;
    violations.append(&mut report.violations);

    ValidationReport::from_findings(report.checks_total + 1, failed, violations, report.warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_policy::{Backend, Channel, Condition, Operator, Policy, Severity};

    fn trigger(id: &str) -> Policy {
        Policy::trigger(id, "Slow", Severity::High)
            .with_condition(Condition::new("response_time", Operator::GreaterThan, "5000"))
            .with_channel(Channel::Email)
    }

    #[test]
    fn clean_set_is_valid() {
        let mut set = PolicySet::new();
        set.insert(trigger("slow")).unwrap();

        let report = validate(&set);
        assert_eq!(report.status, Status::Valid);
        assert_eq!(report.checks_passed, report.checks_total);
    }

    #[test]
    fn warnings_keep_set_valid() {
        let mut set = PolicySet::new();
        set.insert(trigger("a")).unwrap();
        set.insert(trigger("b")).unwrap();

        let report = validate(&set);
        assert_eq!(report.status, Status::ValidWithWarnings);
        assert!(report.is_valid());
        assert_eq!(report.checks_passed, 3);
    }

    #[test]
    fn violations_make_set_invalid() {
        let mut set = PolicySet::new();
        set.insert(Policy::trigger("empty", "", Severity::Low).with_channel(Channel::Sms))
            .unwrap();

        let report = validate(&set);
        assert!(report.is_invalid());
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn endpoint_checks_are_included() {
        let mut endpoint = EndpointDefinition::new("/orders", Backend::new(""));
        endpoint.policies.insert(trigger("slow")).unwrap();

        let report = validate_endpoint(&endpoint);
        assert!(report.is_invalid());
        assert_eq!(report.checks_total, 5);
        assert_eq!(report.checks_passed, 4);
        assert_eq!(report.violations[0].check, "backend");
    }
}
