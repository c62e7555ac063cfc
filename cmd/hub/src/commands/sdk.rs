//! SDK command implementation.

use anyhow::{Context, Result};
use hub_render::{render_sdk, Language, SdkParams};
use std::fs;
use tracing::info;

/// Runs the sdk command.
pub fn run(
    policy_path: &str,
    language: &str,
    endpoint: Option<&str>,
    base_url: &str,
    output_path: Option<&str>,
) -> Result<()> {
    let language: Language = language
        .parse()
        .with_context(|| format!("Unknown language: {language}. Use typescript, python or curl."))?;

    let document = super::load(policy_path)?;
    let endpoint = super::select_endpoint(&document, endpoint)?;

    let snippet = render_sdk(&SdkParams::from_endpoint(endpoint, base_url), language);
    match output_path {
        Some(path) => {
            fs::write(path, &snippet)
                .with_context(|| format!("Failed to write output file: {path}"))?;
            info!("{} client for {} written to: {}", language, endpoint.path, path);
        }
        None => print!("{snippet}"),
    }
    Ok(())
}
