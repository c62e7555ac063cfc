//! Endpoint definitions and multi-endpoint documents.

use crate::error::{Error, Result};
use crate::parser;
use crate::set::PolicySet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// HTTP method served by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
    /// HEAD.
    Head,
    /// OPTIONS.
    Options,
}

impl HttpMethod {
    /// Resolves a method from its name (case-insensitive).
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Returns the uppercase method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry behaviour towards the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub attempts: u32,
    /// Delay between attempts in milliseconds.
    pub backoff_ms: u64,
}

/// Upstream service an endpoint forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Base URL of the upstream service.
    pub url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry behaviour.
    #[serde(default)]
    pub retry: RetryPolicy,
}

const fn default_timeout_ms() -> u64 {
    30_000
}

impl Backend {
    /// Creates a backend with the default timeout and no retries.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: default_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

/// An API endpoint and its ordered policy set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    /// Request path, e.g. `/v1/orders`.
    pub path: String,
    /// Methods served.
    #[serde(default)]
    pub methods: Vec<HttpMethod>,
    /// Upstream service.
    pub backend: Backend,
    /// Attached policies.
    #[serde(default)]
    pub policies: PolicySet,
}

impl EndpointDefinition {
    /// Creates an endpoint with no methods and no policies.
    #[must_use]
    pub fn new(path: impl Into<String>, backend: Backend) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
            backend,
            policies: PolicySet::new(),
        }
    }

    /// Adds a served method.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }
}

/// A set of endpoint definitions loaded from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubDocument {
    /// Endpoints in file order.
    pub endpoints: Vec<EndpointDefinition>,
}

impl HubDocument {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid, a policy set has duplicate
    /// ids, or two endpoints share a path.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let document: Self = serde_yaml::from_str(input)?;
        document.ensure_unique_paths()?;
        Ok(document)
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid, a policy set has duplicate
    /// ids, or two endpoints share a path.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(input)?;
        document.ensure_unique_paths()?;
        Ok(document)
    }

    /// Checks that no two endpoints share a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEndpoint`] naming the first repeated path.
    pub fn ensure_unique_paths(&self) -> Result<()> {
        let mut seen = HashSet::new();
        match self.endpoints.iter().find(|e| !seen.insert(e.path.as_str())) {
            Some(endpoint) => Err(Error::DuplicateEndpoint(endpoint.path.clone())),
            None => Ok(()),
        }
    }

    /// Finds an endpoint by path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<&EndpointDefinition> {
        self.endpoints.iter().find(|e| e.path == path)
    }
}

impl From<EndpointDefinition> for HubDocument {
    fn from(endpoint: EndpointDefinition) -> Self {
        Self {
            endpoints: vec![endpoint],
        }
    }
}

/// Loads a document, choosing the format from the file extension.
///
/// `.toon` files hold a single endpoint; `.yaml`, `.yml` and `.json` hold a
/// [`HubDocument`].
///
/// # Errors
///
/// Returns an error if the file cannot be read, the extension is unknown, or
/// the content is invalid.
pub fn load_document(path: impl AsRef<Path>) -> Result<HubDocument> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let document = match extension.as_str() {
        "toon" => HubDocument::from(parser::parse(&content)?),
        "yaml" | "yml" => HubDocument::from_yaml_str(&content)?,
        "json" => HubDocument::from_json_str(&content)?,
        other => return Err(Error::UnsupportedFormat(other.to_string())),
    };

    debug!(
        path = %path.display(),
        endpoints = document.endpoints.len(),
        "loaded hub document"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PolicyType, Severity};

    const YAML: &str = r"
endpoints:
  - path: /v1/orders
    methods: [GET, POST]
    backend:
      url: https://orders.internal
      retry:
        attempts: 3
        backoff_ms: 250
    policies:
      - id: slow
        name: Slow responses
        type: monitoring
        severity: high
        priority: 1
        channels: [email, sms]
        conditions:
          - metric: response_time
            operator: greater_than
            value: '5000'
            duration: 5
      - id: limit
        name: Per-key limit
        type: rateLimit
        requests: 50
        window_seconds: 10
";

    #[test]
    fn yaml_document_loads() {
        let doc = HubDocument::from_yaml_str(YAML).unwrap();
        let endpoint = doc.endpoint("/v1/orders").unwrap();

        assert_eq!(endpoint.methods, vec![HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(endpoint.backend.timeout_ms, 30_000);
        assert_eq!(endpoint.backend.retry.attempts, 3);
        assert_eq!(endpoint.policies.len(), 2);

        let ordered = endpoint.policies.ordered();
        assert_eq!(ordered[0].kind(), PolicyType::RateLimit);
        assert_eq!(ordered[1].severity(), Some(Severity::High));
        assert_eq!(ordered[1].conditions[0].duration_minutes, 5);
    }

    #[test]
    fn json_round_trip_keeps_policies() {
        let doc = HubDocument::from_yaml_str(YAML).unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let back = HubDocument::from_json_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn duplicate_endpoint_paths_are_rejected() {
        let yaml = r"
endpoints:
  - path: /v1/orders
    backend: { url: https://a.internal }
    policies:
      - { id: a, name: A, type: monitoring }
  - path: /v1/orders
    backend: { url: https://b.internal }
    policies:
      - { id: b, name: B, type: monitoring }
";
        let err = HubDocument::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::DuplicateEndpoint(ref path) if path == "/v1/orders"));

        let orders = |url: &str| EndpointDefinition::new("/v1/orders", Backend::new(url));
        let mut doc = HubDocument::from(orders("https://a"));
        doc.endpoints.push(orders("https://b"));
        let json = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            HubDocument::from_json_str(&json),
            Err(Error::DuplicateEndpoint(_))
        ));
    }

    #[test]
    fn http_method_names() {
        assert_eq!(HttpMethod::from_name("patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::from_name("TRACE"), None);
    }
}
