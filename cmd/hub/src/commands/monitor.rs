//! Monitor command implementation.

use anyhow::{Context, Result};
use hub_monitor::{Monitor, MonitorConfig};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

/// Runs the monitor command.
pub async fn run(config_path: &str, samples: &str) -> Result<()> {
    let config = MonitorConfig::load(config_path)
        .with_context(|| format!("Failed to load monitor config: {config_path}"))?;
    let document = config
        .load_documents()
        .with_context(|| "Failed to load policy documents")?;

    let input: Box<dyn AsyncBufRead + Unpin + Send> = if samples == "-" {
        info!("Reading samples from stdin");
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(samples)
            .await
            .with_context(|| format!("Failed to open samples: {samples}"))?;
        info!("Reading samples from {}", samples);
        Box::new(BufReader::new(file))
    };

    let stats = Monitor::new(document, config)
        .run(input)
        .await
        .with_context(|| "Monitor failed")?;

    info!(
        "Monitor stopped: {} snapshot(s), {} event(s) delivered, {} error(s), {} stale",
        stats.workers.snapshots, stats.dispatch.delivered, stats.workers.errors, stats.workers.stale
    );
    Ok(())
}
