//! Subcommand implementations.

pub mod docs;
pub mod evaluate;
pub mod explain;
pub mod export;
pub mod init;
pub mod monitor;
pub mod sdk;
pub mod validate;

use anyhow::{Context, Result};
use hub_policy::{EndpointDefinition, HubDocument};
use tracing::info;

/// Loads a policy document by extension.
pub fn load(policy_path: &str) -> Result<HubDocument> {
    let document = hub_policy::load_document(policy_path)
        .with_context(|| format!("Failed to load policy document: {policy_path}"))?;
    info!(
        "Loaded {} endpoint(s) from {}",
        document.endpoints.len(),
        policy_path
    );
    Ok(document)
}

/// Picks an endpoint by path, or the first one.
pub fn select_endpoint<'a>(
    document: &'a HubDocument,
    path: Option<&str>,
) -> Result<&'a EndpointDefinition> {
    match path {
        Some(path) => document
            .endpoint(path)
            .with_context(|| format!("No endpoint with path '{path}' in document")),
        None => document
            .endpoints
            .first()
            .context("Document defines no endpoints"),
    }
}
