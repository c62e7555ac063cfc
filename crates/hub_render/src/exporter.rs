//! Normalized YAML/JSON export of hub documents.

use crate::error::{Error, Result};
use hub_policy::{EndpointDefinition, HubDocument, PolicySet};
use std::str::FromStr;
use tracing::debug;

/// Output format for exported documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// YAML format (default).
    #[default]
    Yaml,
    /// JSON format.
    Json,
}

impl OutputFormat {
    /// File extension for the format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::Unsupported {
                kind: "output format",
                name: other.to_string(),
            }),
        }
    }
}

/// Export options.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Output format.
    pub format: OutputFormat,
    /// Keep disabled policies in the output.
    pub include_disabled: bool,
}

/// Writes hub documents with policies in execution order.
///
/// Output is deterministic: the same document always exports to the same
/// bytes, so exports can be fingerprinted by a [`Lockfile`](crate::Lockfile).
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    /// Creates an exporter with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an exporter with the given options.
    #[must_use]
    pub const fn with_options(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Exports a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export(&self, document: &HubDocument) -> Result<String> {
        let normalized = self.normalize(document)?;
        debug!(
            endpoints = normalized.endpoints.len(),
            format = self.options.format.extension(),
            "exporting document"
        );
        match self.options.format {
            OutputFormat::Yaml => serde_yaml::to_string(&normalized).map_err(Error::from),
            OutputFormat::Json => serde_json::to_string_pretty(&normalized).map_err(Error::from),
        }
    }

    /// Returns the document with every policy set in execution order.
    ///
    /// # Errors
    ///
    /// Returns an error if a policy set holds duplicate ids.
    pub fn normalize(&self, document: &HubDocument) -> Result<HubDocument> {
        let endpoints = document
            .endpoints
            .iter()
            .map(|endpoint| self.normalize_endpoint(endpoint))
            .collect::<Result<Vec<_>>>()?;
        Ok(HubDocument { endpoints })
    }

    fn normalize_endpoint(&self, endpoint: &EndpointDefinition) -> Result<EndpointDefinition> {
        let ordered: Vec<_> = endpoint
            .policies
            .ordered()
            .into_iter()
            .filter(|p| p.enabled || self.options.include_disabled)
            .cloned()
            .collect();
        Ok(EndpointDefinition {
            path: endpoint.path.clone(),
            methods: endpoint.methods.clone(),
            backend: endpoint.backend.clone(),
            policies: PolicySet::try_from(ordered)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_policy::{Backend, Policy, PolicyConfig, PolicyType};
    use proptest::prelude::*;

    fn document() -> HubDocument {
        let mut endpoint = EndpointDefinition::new("/v1/orders", Backend::new("https://orders.internal"));
        for (id, policy_type, priority) in [
            ("cache", PolicyType::Caching, 0),
            ("auth", PolicyType::Authentication, 0),
            ("limit-2", PolicyType::RateLimit, 2),
            ("limit-1", PolicyType::RateLimit, 1),
        ] {
            endpoint
                .policies
                .insert(Policy::new(id, id, PolicyConfig::default_for(policy_type)).with_priority(priority))
                .unwrap();
        }
        endpoint
            .policies
            .insert(Policy::new("off", "off", PolicyConfig::default_for(PolicyType::Security)).disabled())
            .unwrap();
        HubDocument::from(endpoint)
    }

    #[test]
    fn export_orders_policies() {
        let normalized = Exporter::new().normalize(&document()).unwrap();
        let ids: Vec<_> = normalized.endpoints[0]
            .policies
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["auth", "limit-1", "limit-2", "cache"]);
    }

    #[test]
    fn include_disabled_keeps_everything() {
        let exporter = Exporter::with_options(ExportOptions {
            include_disabled: true,
            ..Default::default()
        });
        assert_eq!(exporter.normalize(&document()).unwrap().endpoints[0].policies.len(), 5);
    }

    #[test]
    fn json_export_round_trips() {
        let exporter = Exporter::with_options(ExportOptions {
            format: OutputFormat::Json,
            ..Default::default()
        });
        let output = exporter.export(&document()).unwrap();
        let back = HubDocument::from_json_str(&output).unwrap();
        assert_eq!(back, Exporter::new().normalize(&document()).unwrap());
    }

    #[test]
    fn export_is_deterministic() {
        let exporter = Exporter::new();
        assert_eq!(exporter.export(&document()).unwrap(), exporter.export(&document()).unwrap());
    }

    #[test]
    fn format_names() {
        assert_eq!("YML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("toml".parse::<OutputFormat>().is_err());
    }

    proptest! {
        #[test]
        fn normalizing_twice_changes_nothing(
            specs in proptest::collection::vec((0usize..PolicyType::ALL.len(), 0u32..3, any::<bool>()), 0..12),
        ) {
            let mut endpoint = EndpointDefinition::new("/p", Backend::new("https://p.internal"));
            for (i, (kind, priority, enabled)) in specs.into_iter().enumerate() {
                let mut policy = Policy::new(
                    format!("p{i}"),
                    format!("Policy {i}"),
                    PolicyConfig::default_for(PolicyType::ALL[kind]),
                )
                .with_priority(priority);
                policy.enabled = enabled;
                endpoint.policies.insert(policy).unwrap();
            }
            let document = HubDocument::from(endpoint);

            let exporter = Exporter::new();
            let once = exporter.normalize(&document).unwrap();
            let twice = exporter.normalize(&once).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.endpoints[0].policies.iter().all(|p| p.enabled));
        }
    }
}
