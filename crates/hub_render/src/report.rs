//! Policy report generation.
//!
//! The report explains, for one endpoint, the order in which its policies run
//! and what each of them does, followed by the validation findings.

use crate::describe;
use hub_evaluator::validate_endpoint;
use hub_policy::{EndpointDefinition, PolicyType};

/// Generates a markdown explanation of an endpoint's policies.
///
/// The report includes:
/// - Endpoint overview
/// - Policies in execution order
/// - Per-type summary
/// - Validation findings
#[must_use]
pub fn generate_report(endpoint: &EndpointDefinition) -> String {
    let mut report = String::new();
    let policies = &endpoint.policies;

    report.push_str(&format!("# Policy Report: {}\n\n", endpoint.path));

    report.push_str("## Overview\n\n");
    if !endpoint.methods.is_empty() {
        let methods: Vec<_> = endpoint.methods.iter().map(|m| m.as_str()).collect();
        report.push_str(&format!("- **Methods**: {}\n", methods.join(", ")));
    }
    report.push_str(&format!(
        "- **Backend**: {} (timeout {} ms, {} retries)\n",
        endpoint.backend.url, endpoint.backend.timeout_ms, endpoint.backend.retry.attempts
    ));
    let enabled = policies.iter().filter(|p| p.enabled).count();
    report.push_str(&format!(
        "- **Policies**: {} ({} enabled)\n\n",
        policies.len(),
        enabled
    ));

    report.push_str("## Execution Order\n\n");
    report.push_str("Policies run by type, then by priority (lowest first), then in declaration order.\n\n");

    for (i, policy) in policies.ordered().into_iter().enumerate() {
        let state = if policy.enabled { "" } else { " [disabled]" };
        report.push_str(&format!(
            "### {}. {} ({}, priority {}){}\n\n",
            i + 1,
            policy.name,
            policy.kind(),
            policy.priority,
            state
        ));
        report.push_str(&format!("- **Id**: `{}`\n", policy.id));
        report.push_str(&format!("- **When**: {}\n", describe::conditions(policy)));
        report.push_str(&format!("- **Action**: {}\n", describe::config(&policy.config)));
        if !policy.channels.is_empty() {
            let channels: Vec<_> = policy.channels.iter().map(|c| c.as_str()).collect();
            report.push_str(&format!("- **Notify**: {}\n", channels.join(", ")));
        }
        report.push('\n');
    }

    report.push_str("## Summary\n\n");
    for policy_type in PolicyType::ALL {
        let names: Vec<_> = policies
            .ordered()
            .into_iter()
            .filter(|p| p.kind() == policy_type && p.enabled)
            .map(|p| p.name.as_str())
            .collect();
        if !names.is_empty() {
            report.push_str(&format!("**{}**: {}\n", policy_type, names.join(", ")));
        }
    }
    report.push('\n');

    let validation = validate_endpoint(endpoint);
    report.push_str("## Findings\n\n");
    if validation.violations.is_empty() && validation.warnings.is_empty() {
        report.push_str("No problems found.\n");
    }
    for violation in &validation.violations {
        report.push_str(&format!("- {} `{}`: {}\n", violation.level, violation.check, violation.message));
    }
    for warning in &validation.warnings {
        report.push_str(&format!("- {} `{}`: {}\n", warning.level, warning.check, warning.message));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_policy::{
        Backend, Channel, Condition, HttpMethod, Operator, Policy, PolicyConfig, RateLimitConfig,
        Severity,
    };

    fn endpoint() -> EndpointDefinition {
        let mut endpoint = EndpointDefinition::new("/v1/orders", Backend::new("https://orders.internal"))
            .with_method(HttpMethod::Get);
        endpoint
            .policies
            .insert(
                Policy::trigger("slow", "Slow responses", Severity::High)
                    .with_condition(
                        Condition::new("response_time", Operator::GreaterThan, "5000")
                            .sustained_for(5),
                    )
                    .with_channel(Channel::Email),
            )
            .unwrap();
        endpoint
            .policies
            .insert(
                Policy::new(
                    "limit",
                    "Per-key limit",
                    PolicyConfig::RateLimit(RateLimitConfig::default()),
                )
                .with_priority(1),
            )
            .unwrap();
        endpoint
    }

    #[test]
    fn report_lists_policies_in_execution_order() {
        let report = generate_report(&endpoint());

        assert!(report.starts_with("# Policy Report: /v1/orders"));
        let limit = report.find("### 1. Per-key limit (rateLimit, priority 1)").unwrap();
        let slow = report.find("### 2. Slow responses (monitoring, priority 0)").unwrap();
        assert!(limit < slow);
        assert!(report.contains("- **When**: response time (ms) > 5000 for 5 min"));
        assert!(report.contains("- **Notify**: email"));
        assert!(report.contains("No problems found."));
    }

    #[test]
    fn report_includes_findings() {
        let mut endpoint = endpoint();
        endpoint
            .policies
            .insert(Policy::trigger("quiet", "Quiet", Severity::Low).with_condition(
                Condition::new("status_code", Operator::Equals, "503"),
            ))
            .unwrap();

        let report = generate_report(&endpoint);
        assert!(report.contains("WARNING `channels`"));
    }
}
