//! Typed policy model.
//!
//! Policies carry their type-specific configuration as a tagged union, so a
//! policy's type and its payload can never disagree. Condition thresholds are
//! kept exactly as configured; turning them into comparable predicates is the
//! evaluator's job, which lets one malformed threshold fail a single policy
//! instead of the whole document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable policy identifier, unique within a [`crate::PolicySet`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    /// Creates a new policy id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PolicyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PolicyId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A metric that conditions are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Metric {
    /// Backend response time in milliseconds.
    ResponseTime,
    /// HTTP status code of the last response.
    StatusCode,
    /// Share of failed requests, 0 to 100.
    ErrorPercentage,
    /// Request throughput.
    RequestsPerMinute,
    /// Availability, 0 to 100.
    UptimePercentage,
    /// Body of the last response.
    ResponseBody,
    /// Error message of the last failure.
    ErrorMessage,
    /// Any other metric name, typed by its samples.
    Other(String),
}

/// Declared value type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Thresholds and samples must be numbers.
    Numeric,
    /// Thresholds and samples are text.
    Text,
    /// No declared type; the threshold decides.
    Dynamic,
}

impl Metric {
    /// Resolves a metric from its configured name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "response_time" => Self::ResponseTime,
            "status_code" => Self::StatusCode,
            "error_percentage" => Self::ErrorPercentage,
            "requests_per_minute" => Self::RequestsPerMinute,
            "uptime_percentage" => Self::UptimePercentage,
            "response_body" => Self::ResponseBody,
            "error_message" => Self::ErrorMessage,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the configured name of this metric.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ResponseTime => "response_time",
            Self::StatusCode => "status_code",
            Self::ErrorPercentage => "error_percentage",
            Self::RequestsPerMinute => "requests_per_minute",
            Self::UptimePercentage => "uptime_percentage",
            Self::ResponseBody => "response_body",
            Self::ErrorMessage => "error_message",
            Self::Other(name) => name,
        }
    }

    /// Returns the declared value type of this metric.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::ResponseTime
            | Self::StatusCode
            | Self::ErrorPercentage
            | Self::RequestsPerMinute
            | Self::UptimePercentage => MetricKind::Numeric,
            Self::ResponseBody | Self::ErrorMessage => MetricKind::Text,
            Self::Other(_) => MetricKind::Dynamic,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Metric {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<&str> for Metric {
    fn from(value: &str) -> Self {
        Self::from_name(value)
    }
}

impl From<Metric> for String {
    fn from(value: Metric) -> Self {
        match value {
            Metric::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Sample is strictly greater than the threshold.
    GreaterThan,
    /// Sample is strictly less than the threshold.
    LessThan,
    /// Sample equals the threshold.
    Equals,
    /// Sample differs from the threshold.
    NotEquals,
    /// Sample text contains the threshold text.
    Contains,
    /// Sample lies within an inclusive `min,max` range.
    Between,
}

impl Operator {
    /// Resolves an operator from its name or symbol.
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "greater_than" | ">" => Some(Self::GreaterThan),
            "less_than" | "<" => Some(Self::LessThan),
            "equals" | "==" | "=" => Some(Self::Equals),
            "not_equals" | "!=" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "between" => Some(Self::Between),
            _ => None,
        }
    }

    /// Returns the configured name of this operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::Between => "between",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate: metric, operator, threshold and sustain window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Metric the sample is read from.
    pub metric: Metric,
    /// Comparison operator.
    pub operator: Operator,
    /// Threshold exactly as configured.
    pub value: String,
    /// Minutes the comparison must hold before the condition fires.
    #[serde(default, alias = "duration")]
    pub duration_minutes: u32,
}

impl Condition {
    /// Creates a condition that fires immediately.
    #[must_use]
    pub fn new(metric: impl Into<Metric>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            operator,
            value: value.into(),
            duration_minutes: 0,
        }
    }

    /// Sets the sustain window in minutes.
    #[must_use]
    pub const fn sustained_for(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }
}

/// Display-only projection: `metric operator value [for Nm]`.
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.value)?;
        if self.duration_minutes > 0 {
            write!(f, " for {}m", self.duration_minutes)?;
        }
        Ok(())
    }
}

/// Policy category. Declaration order is execution precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyType {
    /// Caller identity checks.
    Authentication,
    /// Role and scope checks.
    Authorization,
    /// Request quotas.
    RateLimit,
    /// Header rewrites.
    Transformation,
    /// Response caching.
    Caching,
    /// CORS and network restrictions.
    Security,
    /// Metric triggers that notify channels.
    Monitoring,
}

impl PolicyType {
    /// All policy types in execution order.
    pub const ALL: [Self; 7] = [
        Self::Authentication,
        Self::Authorization,
        Self::RateLimit,
        Self::Transformation,
        Self::Caching,
        Self::Security,
        Self::Monitoring,
    ];

    /// Execution precedence (lower runs first).
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Authentication => 0,
            Self::Authorization => 1,
            Self::RateLimit => 2,
            Self::Transformation => 3,
            Self::Caching => 4,
            Self::Security => 5,
            Self::Monitoring => 6,
        }
    }

    /// Resolves a policy type from its configured name.
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "authentication" => Some(Self::Authentication),
            "authorization" => Some(Self::Authorization),
            "rateLimit" | "rate_limit" => Some(Self::RateLimit),
            "transformation" => Some(Self::Transformation),
            "caching" => Some(Self::Caching),
            "security" => Some(Self::Security),
            "monitoring" | "trigger" => Some(Self::Monitoring),
            _ => None,
        }
    }

    /// Returns the configured name of this policy type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::RateLimit => "rateLimit",
            Self::Transformation => "transformation",
            Self::Caching => "caching",
            Self::Security => "security",
            Self::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Low,
    /// Needs attention.
    #[default]
    Medium,
    /// Needs prompt attention.
    High,
    /// Service affecting.
    Critical,
}

impl Severity {
    /// Resolves a severity from its configured name.
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Returns the configured name of this severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Email notification.
    Email,
    /// SMS notification.
    Sms,
    /// WhatsApp notification.
    Whatsapp,
}

impl Channel {
    /// Resolves a channel from its configured name.
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "email" => Some(Self::Email),
            "sms" => Some(Self::Sms),
            "whatsapp" => Some(Self::Whatsapp),
            _ => None,
        }
    }

    /// Returns the configured name of this channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How multiple conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every condition must hold.
    #[default]
    All,
    /// At least one condition must hold.
    Any,
}

impl MatchMode {
    /// Resolves a match mode from its configured name.
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "and" => Some(Self::All),
            "any" | "or" => Some(Self::Any),
            _ => None,
        }
    }

    /// Returns the configured name of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

/// Delivery schedule of trigger notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Notify on every firing tick.
    #[default]
    Immediate,
}

/// Authentication scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// Static API key header.
    #[default]
    ApiKey,
    /// Bearer JWT.
    Jwt,
    /// OAuth 2.0 access token.
    Oauth2,
    /// HTTP basic auth.
    Basic,
}

impl AuthScheme {
    /// Resolves a scheme from its configured name.
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "api_key" | "apiKey" => Some(Self::ApiKey),
            "jwt" => Some(Self::Jwt),
            "oauth2" => Some(Self::Oauth2),
            "basic" => Some(Self::Basic),
            _ => None,
        }
    }

    /// Returns the configured name of this scheme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Jwt => "jwt",
            Self::Oauth2 => "oauth2",
            Self::Basic => "basic",
        }
    }
}

/// Authentication policy payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Credential scheme.
    pub scheme: AuthScheme,
    /// Header carrying the credential, if not the scheme default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

/// Authorization policy payload (RBAC).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Roles allowed to call the endpoint.
    pub roles: Vec<String>,
    /// Token scopes required by the endpoint.
    pub scopes: Vec<String>,
}

/// Rate limit policy payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub requests: u32,
    /// Window length in seconds.
    pub window_seconds: u32,
    /// Extra requests tolerated in a burst.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window_seconds: 60,
            burst: None,
        }
    }
}

/// Caching policy payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingConfig {
    /// Cache entry lifetime in seconds.
    pub ttl_seconds: u32,
    /// Request headers that split the cache key.
    pub vary_headers: Vec<String>,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            vary_headers: Vec::new(),
        }
    }
}

/// Header transformation policy payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationConfig {
    /// Headers set on the forwarded request.
    pub add_headers: BTreeMap<String, String>,
    /// Headers stripped from the forwarded request.
    pub remove_headers: Vec<String>,
}

/// Security policy payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Allowed CORS methods.
    pub cors_methods: Vec<String>,
    /// Allowed client networks.
    pub ip_allowlist: Vec<String>,
}

/// Monitoring (trigger) policy payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Severity attached to firing events.
    pub severity: Severity,
    /// Notification schedule.
    pub schedule: Schedule,
}

/// Type-specific policy payload, tagged by policy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PolicyConfig {
    /// Authentication payload.
    Authentication(AuthenticationConfig),
    /// Authorization payload.
    Authorization(AuthorizationConfig),
    /// Rate limit payload.
    RateLimit(RateLimitConfig),
    /// Transformation payload.
    Transformation(TransformationConfig),
    /// Caching payload.
    Caching(CachingConfig),
    /// Security payload.
    Security(SecurityConfig),
    /// Monitoring payload.
    Monitoring(MonitoringConfig),
}

impl PolicyConfig {
    /// Returns the default payload for a policy type.
    #[must_use]
    pub fn default_for(policy_type: PolicyType) -> Self {
        match policy_type {
            PolicyType::Authentication => Self::Authentication(AuthenticationConfig::default()),
            PolicyType::Authorization => Self::Authorization(AuthorizationConfig::default()),
            PolicyType::RateLimit => Self::RateLimit(RateLimitConfig::default()),
            PolicyType::Transformation => Self::Transformation(TransformationConfig::default()),
            PolicyType::Caching => Self::Caching(CachingConfig::default()),
            PolicyType::Security => Self::Security(SecurityConfig::default()),
            PolicyType::Monitoring => Self::Monitoring(MonitoringConfig::default()),
        }
    }

    /// Returns the policy type this payload belongs to.
    #[must_use]
    pub const fn kind(&self) -> PolicyType {
        match self {
            Self::Authentication(_) => PolicyType::Authentication,
            Self::Authorization(_) => PolicyType::Authorization,
            Self::RateLimit(_) => PolicyType::RateLimit,
            Self::Transformation(_) => PolicyType::Transformation,
            Self::Caching(_) => PolicyType::Caching,
            Self::Security(_) => PolicyType::Security,
            Self::Monitoring(_) => PolicyType::Monitoring,
        }
    }
}

/// A configured rule attached to an endpoint. Triggers are monitoring policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique, immutable identifier.
    pub id: PolicyId,
    /// Human-readable name.
    pub name: String,
    /// Disabled policies never evaluate.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ordering key within the policy type (lower runs first).
    #[serde(default)]
    pub priority: u32,
    /// Predicates gating the policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// How the conditions combine.
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Channels notified when the policy fires.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub channels: BTreeSet<Channel>,
    /// Type-specific payload; its tag is the policy type.
    #[serde(flatten)]
    pub config: PolicyConfig,
}

const fn default_enabled() -> bool {
    true
}

impl Policy {
    /// Creates an enabled policy with priority 0 and no conditions.
    #[must_use]
    pub fn new(id: impl Into<PolicyId>, name: impl Into<String>, config: PolicyConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            priority: 0,
            conditions: Vec::new(),
            match_mode: MatchMode::All,
            channels: BTreeSet::new(),
            config,
        }
    }

    /// Creates a monitoring policy (trigger) with the given severity.
    #[must_use]
    pub fn trigger(id: impl Into<PolicyId>, name: impl Into<String>, severity: Severity) -> Self {
        Self::new(
            id,
            name,
            PolicyConfig::Monitoring(MonitoringConfig {
                severity,
                schedule: Schedule::Immediate,
            }),
        )
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Appends a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds a notification channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.insert(channel);
        self
    }

    /// Sets how conditions combine.
    #[must_use]
    pub const fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Marks the policy disabled.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns the policy type, derived from the payload.
    #[must_use]
    pub const fn kind(&self) -> PolicyType {
        self.config.kind()
    }

    /// Returns the trigger severity; `None` for non-monitoring policies.
    #[must_use]
    pub const fn severity(&self) -> Option<Severity> {
        match &self.config {
            PolicyConfig::Monitoring(cfg) => Some(cfg.severity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_type_order_matches_precedence() {
        let mut sorted = PolicyType::ALL;
        sorted.sort();
        assert_eq!(sorted, PolicyType::ALL);
        for pair in PolicyType::ALL.windows(2) {
            assert!(pair[0].precedence() < pair[1].precedence());
        }
    }

    #[test]
    fn metric_names_round_trip() {
        for name in ["response_time", "status_code", "response_body", "queue_depth"] {
            assert_eq!(Metric::from_name(name).as_str(), name);
        }
        assert_eq!(Metric::from_name("queue_depth").kind(), MetricKind::Dynamic);
        assert_eq!(Metric::ResponseTime.kind(), MetricKind::Numeric);
        assert_eq!(Metric::ErrorMessage.kind(), MetricKind::Text);
    }

    #[test]
    fn condition_display_projection() {
        let condition = Condition::new("response_time", Operator::GreaterThan, "5000").sustained_for(5);
        insta::assert_snapshot!(condition.to_string(), @"response_time greater_than 5000 for 5m");

        let immediate = Condition::new("status_code", Operator::Equals, "503");
        assert_eq!(immediate.to_string(), "status_code equals 503");
    }

    #[test]
    fn severity_only_on_monitoring() {
        let trigger = Policy::trigger("p1", "Slow", Severity::High);
        assert_eq!(trigger.kind(), PolicyType::Monitoring);
        assert_eq!(trigger.severity(), Some(Severity::High));

        let limit = Policy::new(
            "p2",
            "Limit",
            PolicyConfig::default_for(PolicyType::RateLimit),
        );
        assert_eq!(limit.severity(), None);
    }

    #[test]
    fn policy_json_has_flat_type_tag() {
        let policy = Policy::trigger("p1", "Slow responses", Severity::High)
            .with_priority(1)
            .with_condition(
                Condition::new("response_time", Operator::GreaterThan, "5000").sustained_for(5),
            )
            .with_channel(Channel::Email);

        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["type"], "monitoring");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["conditions"][0]["metric"], "response_time");

        let back: Policy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn condition_accepts_duration_alias() {
        let json = r#"{"metric":"response_time","operator":"greater_than","value":"5000","duration":5}"#;
        let condition: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(condition.duration_minutes, 5);
        assert_eq!(condition.metric, Metric::ResponseTime);
    }
}
