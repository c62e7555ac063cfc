//! Monitor configuration.
//!
//! ```yaml
//! policy_paths:
//!   - endpoint.toon
//! channel_capacity: 256
//! stale_policy: skip
//! dispatcher: jsonl
//! events_path: events.jsonl
//! ```

use crate::error::{Error, Result};
use hub_policy::{load_document, HubDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a worker does with a snapshot older than its last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Drop the snapshot and count it as stale.
    #[default]
    Skip,
    /// Evaluate it anyway.
    Evaluate,
}

/// Where firing events are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
    /// Log each event.
    #[default]
    Log,
    /// Append each event to `events_path` as a JSON line.
    #[serde(alias = "json_lines")]
    Jsonl,
}

/// Configuration of the live monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Policy documents to load. Relative paths resolve against the config file.
    pub policy_paths: Vec<PathBuf>,
    /// Capacity of each bounded channel.
    pub channel_capacity: usize,
    /// Stale snapshot handling.
    pub stale_policy: StalePolicy,
    /// Event delivery.
    pub dispatcher: DispatcherKind,
    /// Output file for [`DispatcherKind::Jsonl`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_path: Option<PathBuf>,
    /// Sample format name; detected from the first line when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_format: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            policy_paths: Vec::new(),
            channel_capacity: 256,
            stale_policy: StalePolicy::default(),
            dispatcher: DispatcherKind::default(),
            events_path: None,
            sample_format: None,
        }
    }
}

impl MonitorConfig {
    /// Parses a YAML configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or fails [`MonitorConfig::validate`].
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, resolving relative paths against its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        debug!(
            path = %path.display(),
            documents = config.policy_paths.len(),
            "loaded monitor config"
        );
        Ok(config)
    }

    /// Makes relative paths absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in &mut self.policy_paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(events) = &mut self.events_path {
            if events.is_relative() {
                *events = base.join(&*events);
            }
        }
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on the first inconsistency.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be positive".to_string()));
        }
        if self.dispatcher == DispatcherKind::Jsonl && self.events_path.is_none() {
            return Err(Error::Config(
                "dispatcher 'jsonl' requires events_path".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads every policy document and merges their endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if a document fails to load, no document is
    /// configured, or two documents define the same endpoint path.
    pub fn load_documents(&self) -> Result<HubDocument> {
        if self.policy_paths.is_empty() {
            return Err(Error::Config("no policy_paths configured".to_string()));
        }

        let mut merged = HubDocument::default();
        let mut seen = BTreeSet::new();
        for path in &self.policy_paths {
            let document = load_document(path)?;
            for endpoint in document.endpoints {
                if !seen.insert(endpoint.path.clone()) {
                    return Err(Error::Config(format!(
                        "endpoint '{}' is defined more than once (again in {})",
                        endpoint.path,
                        path.display()
                    )));
                }
                merged.endpoints.push(endpoint);
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = MonitorConfig::from_yaml_str("policy_paths: [a.toon]\n").unwrap();
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.stale_policy, StalePolicy::Skip);
        assert_eq!(config.dispatcher, DispatcherKind::Log);
        assert_eq!(config.policy_paths, vec![PathBuf::from("a.toon")]);
    }

    #[test]
    fn jsonl_dispatcher_needs_events_path() {
        let err = MonitorConfig::from_yaml_str("dispatcher: jsonl\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");

        let config =
            MonitorConfig::from_yaml_str("dispatcher: jsonl\nevents_path: out.jsonl\n").unwrap();
        assert_eq!(config.dispatcher, DispatcherKind::Jsonl);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(MonitorConfig::from_yaml_str("channel_capacity: 0\n").is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(MonitorConfig::from_yaml_str("polcy_paths: []\n").is_err());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let mut config = MonitorConfig {
            policy_paths: vec![PathBuf::from("a.toon"), PathBuf::from("/etc/b.yaml")],
            events_path: Some(PathBuf::from("events.jsonl")),
            ..MonitorConfig::default()
        };
        config.resolve_paths(Path::new("/srv/hub"));

        assert_eq!(config.policy_paths[0], PathBuf::from("/srv/hub/a.toon"));
        assert_eq!(config.policy_paths[1], PathBuf::from("/etc/b.yaml"));
        assert_eq!(config.events_path, Some(PathBuf::from("/srv/hub/events.jsonl")));
    }

    #[test]
    fn loading_needs_documents() {
        let err = MonitorConfig::default().load_documents().unwrap_err();
        assert!(err.to_string().contains("no policy_paths"));
    }
}
