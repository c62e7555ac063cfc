//! Metric samples and their grouping into per-endpoint snapshots.

use chrono::{DateTime, Utc};
use hub_evaluator::{MetricSnapshot, SampleValue};
use hub_policy::Metric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One observed metric value for one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Observation time.
    pub timestamp: DateTime<Utc>,
    /// Endpoint path the value belongs to.
    pub endpoint: String,
    /// Observed metric.
    pub metric: Metric,
    /// Observed value.
    pub value: SampleValue,
}

impl Sample {
    /// Creates a sample.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        endpoint: impl Into<String>,
        metric: impl Into<Metric>,
        value: impl Into<SampleValue>,
    ) -> Self {
        Self {
            timestamp,
            endpoint: endpoint.into(),
            metric: metric.into(),
            value: value.into(),
        }
    }
}

/// Snapshot ready for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSnapshot {
    /// Endpoint path.
    pub endpoint: String,
    /// Collected values.
    pub snapshot: MetricSnapshot,
}

/// Groups consecutive samples of an endpoint that share a timestamp.
///
/// A snapshot is emitted once a sample with a different timestamp arrives for
/// the same endpoint, or when the batcher is flushed. Later values for the
/// same metric within one timestamp replace earlier ones.
#[derive(Debug, Default)]
pub struct SnapshotBatcher {
    pending: BTreeMap<String, MetricSnapshot>,
}

impl SnapshotBatcher {
    /// Creates an empty batcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample, returning the endpoint's previous snapshot if it is complete.
    pub fn push(&mut self, sample: Sample) -> Option<EndpointSnapshot> {
        let Sample {
            timestamp,
            endpoint,
            metric,
            value,
        } = sample;

        let completed = match self.pending.get(&endpoint) {
            Some(pending) if pending.timestamp != timestamp => {
                self.pending.remove(&endpoint).map(|snapshot| EndpointSnapshot {
                    endpoint: endpoint.clone(),
                    snapshot,
                })
            }
            _ => None,
        };

        self.pending
            .entry(endpoint)
            .or_insert_with(|| MetricSnapshot::new(timestamp))
            .insert(metric, value);
        completed
    }

    /// Emits every pending snapshot, oldest first.
    pub fn flush(&mut self) -> Vec<EndpointSnapshot> {
        let mut snapshots: Vec<_> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(endpoint, snapshot)| EndpointSnapshot { endpoint, snapshot })
            .collect();
        snapshots.sort_by(|a, b| {
            a.snapshot
                .timestamp
                .cmp(&b.snapshot.timestamp)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        snapshots
    }

    /// Number of endpoints with a pending snapshot.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Groups a finite sample sequence into snapshots in arrival order.
pub fn group_samples(samples: impl IntoIterator<Item = Sample>) -> Vec<EndpointSnapshot> {
    let mut batcher = SnapshotBatcher::new();
    let mut snapshots: Vec<_> = samples
        .into_iter()
        .filter_map(|sample| batcher.push(sample))
        .collect();
    snapshots.extend(batcher.flush());
    snapshots
}
