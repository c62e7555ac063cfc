//! One-line, human-readable projections of policies and evaluation results.

use hub_evaluator::{FiringEvent, PolicyOutcome, PolicyStatus};
use hub_policy::{AuthScheme, Condition, Metric, Operator, Policy, PolicyConfig};

/// Display label for a metric.
pub fn metric_label(metric: &Metric) -> String {
    match metric {
        Metric::ResponseTime => "response time (ms)".to_string(),
        Metric::StatusCode => "status code".to_string(),
        Metric::ErrorPercentage => "error rate (%)".to_string(),
        Metric::RequestsPerMinute => "requests/min".to_string(),
        Metric::UptimePercentage => "uptime (%)".to_string(),
        Metric::ResponseBody => "response body".to_string(),
        Metric::ErrorMessage => "error message".to_string(),
        Metric::Other(name) => name.clone(),
    }
}

/// Short symbol for an operator.
pub const fn operator_symbol(operator: Operator) -> &'static str {
    match operator {
        Operator::GreaterThan => ">",
        Operator::LessThan => "<",
        Operator::Equals => "==",
        Operator::NotEquals => "!=",
        Operator::Contains => "contains",
        Operator::Between => "between",
    }
}

/// Describes a condition, e.g. `response time (ms) > 5000 for 5 min`.
pub fn condition(condition: &Condition) -> String {
    let label = metric_label(&condition.metric);
    let value = condition.value.trim();
    let mut text = match condition.operator {
        Operator::Contains => format!("{label} contains '{value}'"),
        Operator::Between => match value
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split_once(',')
        {
            Some((min, max)) => format!("{label} between {} and {}", min.trim(), max.trim()),
            None => format!("{label} between {value}"),
        },
        op => format!("{label} {} {value}", operator_symbol(op)),
    };
    if condition.duration_minutes > 0 {
        text.push_str(&format!(" for {} min", condition.duration_minutes));
    }
    text
}

/// Summarizes a type-specific payload.
pub fn config(config: &PolicyConfig) -> String {
    match config {
        PolicyConfig::Authentication(cfg) => {
            let scheme = match cfg.scheme {
                AuthScheme::ApiKey => "API key",
                AuthScheme::Jwt => "JWT",
                AuthScheme::Oauth2 => "OAuth2",
                AuthScheme::Basic => "basic auth",
            };
            cfg.header
                .as_ref()
                .map_or_else(|| scheme.to_string(), |h| format!("{scheme} in {h}"))
        }
        PolicyConfig::Authorization(cfg) => {
            let mut parts = Vec::new();
            if !cfg.roles.is_empty() {
                parts.push(format!("roles {}", cfg.roles.join(", ")));
            }
            if !cfg.scopes.is_empty() {
                parts.push(format!("scopes {}", cfg.scopes.join(", ")));
            }
            if parts.is_empty() {
                "any authenticated caller".to_string()
            } else {
                parts.join("; ")
            }
        }
        PolicyConfig::RateLimit(cfg) => {
            let base = format!("{} requests per {}s", cfg.requests, cfg.window_seconds);
            match cfg.burst {
                Some(burst) => format!("{base} (burst {burst})"),
                None => base,
            }
        }
        PolicyConfig::Transformation(cfg) => format!(
            "add {} header(s), remove {} header(s)",
            cfg.add_headers.len(),
            cfg.remove_headers.len()
        ),
        PolicyConfig::Caching(cfg) => {
            if cfg.vary_headers.is_empty() {
                format!("ttl {}s", cfg.ttl_seconds)
            } else {
                format!("ttl {}s, vary on {}", cfg.ttl_seconds, cfg.vary_headers.join(", "))
            }
        }
        PolicyConfig::Security(cfg) => {
            let origins = if cfg.cors_origins.is_empty() {
                "no CORS origins".to_string()
            } else {
                format!("CORS {}", cfg.cors_origins.join(", "))
            };
            if cfg.ip_allowlist.is_empty() {
                origins
            } else {
                format!("{origins}; {} allowed IP range(s)", cfg.ip_allowlist.len())
            }
        }
        PolicyConfig::Monitoring(cfg) => format!("severity {}", cfg.severity),
    }
}

/// Describes the conditions of a policy joined by its match mode.
pub fn conditions(policy: &Policy) -> String {
    if policy.conditions.is_empty() {
        return "always".to_string();
    }
    let joiner = match policy.match_mode {
        hub_policy::MatchMode::All => " and ",
        hub_policy::MatchMode::Any => " or ",
    };
    policy
        .conditions
        .iter()
        .map(condition)
        .collect::<Vec<_>>()
        .join(joiner)
}

/// Describes a policy on one line.
pub fn policy(policy: &Policy) -> String {
    let mut text = format!(
        "[{} p{}] {}: when {} -> {}",
        policy.kind(),
        policy.priority,
        policy.name,
        conditions(policy),
        config(&policy.config)
    );
    if !policy.channels.is_empty() {
        let channels: Vec<_> = policy.channels.iter().map(|c| c.as_str()).collect();
        text.push_str(&format!(", notify {}", channels.join(", ")));
    }
    if !policy.enabled {
        text.push_str(" (disabled)");
    }
    text
}

/// Describes a firing event.
pub fn event(event: &FiringEvent) -> String {
    let mut text = format!(
        "{} FIRED {} ({})",
        event.timestamp.to_rfc3339(),
        event.policy_id,
        event.policy_type
    );
    if let Some(severity) = event.severity {
        text.push_str(&format!(" severity={severity}"));
    }
    if !event.channels.is_empty() {
        let channels: Vec<_> = event.channels.iter().map(|c| c.as_str()).collect();
        text.push_str(&format!(" channels={}", channels.join("|")));
    }
    text
}

/// Describes a policy outcome, including any faults.
pub fn outcome(outcome: &PolicyOutcome) -> String {
    let status = match &outcome.status {
        PolicyStatus::Disabled => "disabled",
        PolicyStatus::Idle => "idle",
        PolicyStatus::Breaching => "breaching",
        PolicyStatus::Firing => "firing",
        PolicyStatus::ConfigError { .. } => "config error",
        PolicyStatus::EvaluationError { .. } => "evaluation error",
    };
    let mut text = format!("{} ({}): {status}", outcome.policy_id, outcome.policy_type);
    for fault in outcome.status.faults() {
        match fault.condition {
            Some(index) => text.push_str(&format!("; condition {}: {}", index + 1, fault.error)),
            None => text.push_str(&format!("; {}", fault.error)),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_policy::{Channel, PolicyType, RateLimitConfig, Severity};

    #[test]
    fn describes_conditions() {
        insta::assert_snapshot!(
            condition(&Condition::new("response_time", Operator::GreaterThan, "5000").sustained_for(5)),
            @"response time (ms) > 5000 for 5 min"
        );
        insta::assert_snapshot!(
            condition(&Condition::new("error_message", Operator::Contains, "timeout")),
            @"error message contains 'timeout'"
        );
        insta::assert_snapshot!(
            condition(&Condition::new("queue_depth", Operator::Between, "[10, 20]")),
            @"queue_depth between 10 and 20"
        );
    }

    #[test]
    fn describes_trigger() {
        let trigger = Policy::trigger("slow", "Slow responses", Severity::High)
            .with_priority(1)
            .with_condition(Condition::new("response_time", Operator::GreaterThan, "5000"))
            .with_condition(Condition::new("status_code", Operator::Equals, "503"))
            .with_channel(Channel::Sms)
            .with_channel(Channel::Email);

        insta::assert_snapshot!(
            policy(&trigger),
            @"[monitoring p1] Slow responses: when response time (ms) > 5000 and status code == 503 -> severity high, notify email, sms"
        );
    }

    #[test]
    fn describes_unconditional_policy() {
        let limit = Policy::new(
            "limit",
            "Per-key limit",
            PolicyConfig::RateLimit(RateLimitConfig {
                requests: 50,
                window_seconds: 10,
                burst: Some(5),
            }),
        )
        .disabled();

        assert_eq!(
            policy(&limit),
            "[rateLimit p0] Per-key limit: when always -> 50 requests per 10s (burst 5) (disabled)"
        );
        assert_eq!(limit.kind(), PolicyType::RateLimit);
    }
}
