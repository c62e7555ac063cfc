//! Docs command implementation.

use anyhow::{Context, Result};
use hub_render::{render_docs, DocParams};
use std::fs;
use tracing::info;

/// Runs the docs command.
pub fn run(policy_path: &str, base_url: &str, output_path: &str) -> Result<()> {
    let document = super::load(policy_path)?;

    let docs = document
        .endpoints
        .iter()
        .map(|endpoint| render_docs(&DocParams::from_endpoint(endpoint, base_url)))
        .collect::<Vec<_>>()
        .join("\n");

    fs::write(output_path, &docs)
        .with_context(|| format!("Failed to write output file: {output_path}"))?;
    info!("Documentation written to: {}", output_path);
    Ok(())
}
