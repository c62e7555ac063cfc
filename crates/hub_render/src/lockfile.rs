//! Export lockfile.
//!
//! A lockfile records fingerprints of a policy source file and of its
//! normalized export, so a later run can tell whether either changed.

use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use hub_policy::HubDocument;
use serde::{Deserialize, Serialize};
use std::path::Path;
use xxhash_rust::xxh64::xxh64;

const HASH_SEED: u64 = 0x5453_4D41_5254; // "TSMART"

/// Current lockfile format version.
pub const LOCKFILE_VERSION: u32 = 1;

/// Fingerprints of a policy source and its export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Lockfile format version.
    pub version: u32,
    /// Hash of the source file.
    pub source_hash: String,
    /// Hash of the exported output.
    pub export_hash: String,
    /// Endpoint paths in the document.
    pub endpoints: Vec<String>,
    /// Total number of policies.
    pub policy_count: usize,
    /// When the lock was created (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Lockfile {
    /// Creates a lockfile for a document.
    #[must_use]
    pub fn new(document: &HubDocument, source: &str, exported: &str) -> Self {
        Self {
            version: LOCKFILE_VERSION,
            source_hash: hash_content(source),
            export_hash: hash_content(exported),
            endpoints: document.endpoints.iter().map(|e| e.path.clone()).collect(),
            policy_count: document.endpoints.iter().map(|e| e.policies.len()).sum(),
            created_at: None,
        }
    }

    /// Stamps the lockfile with the current time.
    #[must_use]
    pub fn with_timestamp(mut self) -> Self {
        self.created_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        self
    }

    /// Returns true if both fingerprints match.
    #[must_use]
    pub fn verify(&self, source: &str, exported: &str) -> bool {
        self.verify_source(source) && self.verify_export(exported)
    }

    /// Returns true if the source fingerprint matches.
    #[must_use]
    pub fn verify_source(&self, source: &str) -> bool {
        self.source_hash == hash_content(source)
    }

    /// Returns true if the export fingerprint matches.
    #[must_use]
    pub fn verify_export(&self, exported: &str) -> bool {
        self.export_hash == hash_content(exported)
    }

    /// Names the fingerprints that no longer match, `source` before `export`.
    #[must_use]
    pub fn drift(&self, source: &str, exported: &str) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if !self.verify_source(source) {
            changed.push("source");
        }
        if !self.verify_export(exported) {
            changed.push("export");
        }
        changed
    }

    /// Loads a lockfile.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Saves the lockfile.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    /// Serializes to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn hash_content(content: &str) -> String {
    format!("{:016x}", xxh64(content.as_bytes(), HASH_SEED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_policy::{Backend, EndpointDefinition, Policy, Severity};

    fn document() -> HubDocument {
        let mut endpoint = EndpointDefinition::new("/v1/orders", Backend::new("https://orders.internal"));
        endpoint
            .policies
            .insert(Policy::trigger("slow", "Slow", Severity::High))
            .unwrap();
        HubDocument::from(endpoint)
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_content("a"), hash_content("a"));
        assert_ne!(hash_content("a"), hash_content("b"));
        assert_eq!(hash_content("a").len(), 16);
    }

    #[test]
    fn lockfile_records_document() {
        let lock = Lockfile::new(&document(), "source", "export");
        assert_eq!(lock.version, LOCKFILE_VERSION);
        assert_eq!(lock.endpoints, vec!["/v1/orders".to_string()]);
        assert_eq!(lock.policy_count, 1);
        assert!(lock.created_at.is_none());
    }

    #[test]
    fn verification_detects_changes() {
        let lock = Lockfile::new(&document(), "source", "export");
        assert!(lock.verify("source", "export"));
        assert!(!lock.verify("source", "changed"));
        assert!(lock.verify_source("source"));
        assert!(!lock.verify_export("changed"));
    }

    #[test]
    fn drift_names_changed_fingerprints() {
        let lock = Lockfile::new(&document(), "source", "export");
        assert!(lock.drift("source", "export").is_empty());
        assert_eq!(lock.drift("edited", "export"), vec!["source"]);
        assert_eq!(lock.drift("edited", "changed"), vec!["source", "export"]);
    }

    #[test]
    fn saved_lock_loads_and_checks() {
        let path = std::env::temp_dir().join(format!("hub-lock-{}.lock", std::process::id()));
        let lock = Lockfile::new(&document(), "source", "export").with_timestamp();
        lock.save(&path).unwrap();

        let loaded = Lockfile::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, lock);
        assert!(loaded.verify("source", "export"));
        assert_eq!(loaded.drift("source", "changed"), vec!["export"]);
    }

    #[test]
    fn json_round_trip() {
        let lock = Lockfile::new(&document(), "source", "export").with_timestamp();
        let back = Lockfile::from_json(&lock.to_json().unwrap()).unwrap();
        assert_eq!(back, lock);
    }
}
