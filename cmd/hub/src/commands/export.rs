//! Export command implementation.

use anyhow::{Context, Result};
use hub_render::{ExportOptions, Exporter, Lockfile, OutputFormat};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// What to do with the lockfile next to the policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Leave it alone.
    Skip,
    /// Write a fresh lock, reporting what changed since the previous one.
    Write,
    /// Compare against the existing lock and write nothing.
    Check,
}

/// Runs the export command.
pub fn run(
    policy_path: &str,
    output_path: &str,
    format: &str,
    include_disabled: bool,
    lock: LockMode,
) -> Result<()> {
    info!("Exporting policies: {}", policy_path);

    let source = fs::read_to_string(policy_path)
        .with_context(|| format!("Failed to read policy file: {policy_path}"))?;
    let document = super::load(policy_path)?;

    let format: OutputFormat = format
        .parse()
        .with_context(|| format!("Unknown output format: {format}. Use 'yaml' or 'json'."))?;

    let exporter = Exporter::with_options(ExportOptions {
        format,
        include_disabled,
    });
    let output = exporter
        .export(&document)
        .with_context(|| "Failed to export policies")?;

    let lock_path = Path::new(policy_path).with_extension("lock");
    if lock == LockMode::Check {
        let lockfile = Lockfile::load(&lock_path)
            .with_context(|| format!("Failed to read lockfile: {}", lock_path.display()))?;
        let drift = lockfile.drift(&source, &output);
        if !drift.is_empty() {
            anyhow::bail!(
                "Lockfile {} is out of date: {} changed",
                lock_path.display(),
                drift.join(" and ")
            );
        }
        info!("Lockfile is up to date: {}", lock_path.display());
        return Ok(());
    }

    fs::write(output_path, &output)
        .with_context(|| format!("Failed to write output file: {output_path}"))?;
    info!("Export written to: {}", output_path);

    if lock == LockMode::Write {
        if lock_path.exists() {
            match Lockfile::load(&lock_path) {
                Ok(previous) => {
                    for changed in previous.drift(&source, &output) {
                        info!("Lockfile {} fingerprint changed", changed);
                    }
                }
                Err(e) => warn!("Replacing unreadable lockfile {}: {}", lock_path.display(), e),
            }
        }
        let lockfile = Lockfile::new(&document, &source, &output).with_timestamp();
        lockfile
            .save(&lock_path)
            .with_context(|| format!("Failed to write lockfile: {}", lock_path.display()))?;
        info!("Lockfile written to: {}", lock_path.display());
    }

    Ok(())
}
