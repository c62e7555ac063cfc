//! Explain command implementation.

use anyhow::{Context, Result};
use hub_render::generate_report;
use std::fs;
use tracing::info;

/// Runs the explain command.
pub fn run(policy_path: &str, output_path: &str) -> Result<()> {
    info!("Generating policy report for: {}", policy_path);
    let document = super::load(policy_path)?;

    let report = document
        .endpoints
        .iter()
        .map(generate_report)
        .collect::<Vec<_>>()
        .join("\n---\n\n");

    fs::write(output_path, &report)
        .with_context(|| format!("Failed to write output file: {output_path}"))?;

    info!("Policy report written to: {}", output_path);
    Ok(())
}
