//! Individual validation checks.

use crate::evaluator::compile_policy;
use crate::validate::{Violation, Warning};
use hub_policy::{EndpointDefinition, PolicySet, PolicyType};
use std::collections::BTreeMap;

/// Checks that every policy has a non-empty name.
pub fn check_names(set: &PolicySet) -> Vec<Violation> {
    set.iter()
        .filter(|p| p.name.trim().is_empty() || p.id.as_str().trim().is_empty())
        .map(|p| {
            Violation::critical(
                "policy-name",
                format!("Policy '{}' must have a non-empty id and name", p.id),
            )
            .for_policy(&p.id)
        })
        .collect()
}

/// Checks that every condition compiles and every trigger has one.
pub fn check_conditions(set: &PolicySet) -> Vec<Violation> {
    let mut violations = Vec::new();
    for policy in set {
        let Err(faults) = compile_policy(policy) else {
            continue;
        };
        for fault in faults {
            let message = match fault.condition {
                Some(index) => format!(
                    "Condition {} of '{}' ({}) is invalid: {}",
                    index + 1,
                    policy.id,
                    policy.conditions[index],
                    fault.error
                ),
                None => format!("Policy '{}': {}", policy.id, fault.error),
            };
            violations.push(Violation::critical("condition", message).for_policy(&policy.id));
        }
    }
    violations
}

/// Warns about triggers that notify nobody.
pub fn check_channels(set: &PolicySet) -> Vec<Warning> {
    set.iter()
        .filter(|p| p.kind() == PolicyType::Monitoring && p.channels.is_empty())
        .map(|p| {
            Warning::new(
                "channels",
                format!("Trigger '{}' has no notification channels", p.id),
            )
            .for_policy(&p.id)
        })
        .collect()
}

/// Warns about enabled policies of one type sharing a priority.
pub fn check_priority_ties(set: &PolicySet) -> Vec<Warning> {
    let mut groups: BTreeMap<(PolicyType, u32), Vec<&str>> = BTreeMap::new();
    for policy in set.iter().filter(|p| p.enabled) {
        groups
            .entry((policy.kind(), policy.priority))
            .or_default()
            .push(policy.id.as_str());
    }

    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((policy_type, priority), ids)| {
            Warning::new(
                "priority-tie",
                format!(
                    "{policy_type} policies {} share priority {priority}; insertion order decides",
                    ids.join(", ")
                ),
            )
        })
        .collect()
}

/// Checks the endpoint's path and backend.
pub fn check_endpoint(endpoint: &EndpointDefinition) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !endpoint.path.starts_with('/') {
        violations.push(Violation::critical(
            "endpoint-path",
            format!("Endpoint path '{}' must start with '/'", endpoint.path),
        ));
    }
    if endpoint.backend.url.trim().is_empty() {
        violations.push(Violation::critical(
            "backend",
            format!("Endpoint '{}' has no backend URL", endpoint.path),
        ));
    }
    if endpoint.backend.timeout_ms == 0 {
        violations.push(Violation::critical(
            "backend",
            format!("Endpoint '{}' has a zero backend timeout", endpoint.path),
        ));
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_policy::{
        Backend, Channel, Condition, Operator, Policy, PolicyConfig, PolicyId, Severity,
    };

    fn set_of(policies: impl IntoIterator<Item = Policy>) -> PolicySet {
        let mut set = PolicySet::new();
        for policy in policies {
            set.insert(policy).unwrap();
        }
        set
    }

    #[test]
    fn blank_names_are_violations() {
        let set = set_of([Policy::new("cache", "  ", PolicyConfig::default_for(PolicyType::Caching))]);
        let violations = check_names(&set);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].policy_id.as_ref().map(PolicyId::as_str), Some("cache"));
    }

    #[test]
    fn bad_conditions_are_reported_per_condition() {
        let set = set_of([Policy::trigger("slow", "Slow", Severity::High)
            .with_condition(Condition::new("response_time", Operator::GreaterThan, "5000"))
            .with_condition(Condition::new("response_time", Operator::Contains, "x"))]);

        let violations = check_conditions(&set);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.starts_with("Condition 2 of 'slow'"));
    }

    #[test]
    fn empty_trigger_is_a_violation() {
        let set = set_of([Policy::trigger("empty", "Empty", Severity::Low)]);
        assert_eq!(check_conditions(&set).len(), 1);
    }

    #[test]
    fn triggers_without_channels_warn() {
        let quiet = Policy::trigger("quiet", "Quiet", Severity::Low);
        let loud = Policy::trigger("loud", "Loud", Severity::Low).with_channel(Channel::Sms);
        let warnings = check_channels(&set_of([quiet, loud]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("quiet"));
    }

    #[test]
    fn equal_priorities_warn_only_when_enabled() {
        let a = Policy::new("a", "A", PolicyConfig::default_for(PolicyType::Caching));
        let b = Policy::new("b", "B", PolicyConfig::default_for(PolicyType::Caching));
        let c = Policy::new("c", "C", PolicyConfig::default_for(PolicyType::Caching)).disabled();
        let d = Policy::new("d", "D", PolicyConfig::default_for(PolicyType::Security));

        let warnings = check_priority_ties(&set_of([a, b, c, d]));
        assert_eq!(warnings.len(), 1);
        insta::assert_snapshot!(
            warnings[0].message,
            @"caching policies a, b share priority 0; insertion order decides"
        );
    }

    #[test]
    fn endpoint_backend_is_checked() {
        let mut endpoint = EndpointDefinition::new("orders", Backend::new(""));
        endpoint.backend.timeout_ms = 0;
        let checks: Vec<_> = check_endpoint(&endpoint).into_iter().map(|v| v.check).collect();
        assert_eq!(checks, vec!["endpoint-path", "backend", "backend"]);
    }
}
