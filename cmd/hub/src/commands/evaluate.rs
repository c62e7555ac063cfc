//! Evaluate command implementation.
//!
//! Replays a recorded sample file offline and prints, per tick, what fired
//! and which policies could not be evaluated.

use anyhow::{Context, Result};
use hub_monitor::{replay, DecoderRegistry, ReplayOutcome, StalePolicy};
use hub_render::describe;
use std::fs;
use tracing::{info, warn};

/// Runs the evaluate command.
pub fn run(
    policy_path: &str,
    samples_path: &str,
    format: &str,
    input_format: Option<&str>,
) -> Result<()> {
    let json = match format.to_lowercase().as_str() {
        "json" => true,
        "text" => false,
        _ => anyhow::bail!("Unknown output format: {format}. Use 'text' or 'json'."),
    };

    let document = super::load(policy_path)?;

    let input = fs::read_to_string(samples_path)
        .with_context(|| format!("Failed to read samples file: {samples_path}"))?;
    let samples = DecoderRegistry::new()
        .decode(&input, input_format)
        .with_context(|| format!("Failed to decode samples: {samples_path}"))?;
    info!("Decoded {} sample(s)", samples.len());

    let outcome = replay(&document, samples, StalePolicy::Skip);
    for endpoint in &outcome.unknown_endpoints {
        warn!("Samples for unknown endpoint {} were ignored", endpoint);
    }
    for endpoint in &outcome.duplicate_endpoints {
        warn!("Endpoint {} is defined more than once; only the first was evaluated", endpoint);
    }

    if json {
        print_json(&outcome)?;
    } else {
        print_text(&outcome);
    }

    info!(
        "Evaluated {} snapshot(s): {} event(s), {} error(s), {} stale",
        outcome.stats.snapshots, outcome.stats.events, outcome.stats.errors, outcome.stats.stale
    );
    Ok(())
}

fn print_text(outcome: &ReplayOutcome) {
    for tick in &outcome.ticks {
        for event in &tick.report.events {
            println!("{} {}", tick.endpoint, describe::event(event));
        }
        for failed in tick.report.errors() {
            println!(
                "{} {} ERROR {}",
                tick.endpoint,
                tick.report.timestamp.to_rfc3339(),
                describe::outcome(failed)
            );
        }
    }
}

fn print_json(outcome: &ReplayOutcome) -> Result<()> {
    let ticks: Vec<_> = outcome
        .ticks
        .iter()
        .map(|tick| {
            serde_json::json!({
                "endpoint": tick.endpoint,
                "report": tick.report,
            })
        })
        .collect();
    let output = serde_json::to_string_pretty(&ticks).context("Failed to serialize tick reports")?;
    println!("{output}");
    Ok(())
}
