//! Offline replay of recorded samples.

use crate::config::StalePolicy;
use crate::sample::{group_samples, Sample};
use crate::worker::{EndpointWorker, WorkerStats};
use hub_evaluator::TickReport;
use hub_policy::HubDocument;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// The report of one evaluated snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointTick {
    /// Endpoint path.
    pub endpoint: String,
    /// Evaluation result.
    pub report: TickReport,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayOutcome {
    /// Tick reports in evaluation order.
    pub ticks: Vec<EndpointTick>,
    /// Aggregated counters.
    pub stats: WorkerStats,
    /// Endpoints seen in the samples but not defined in the document.
    pub unknown_endpoints: BTreeSet<String>,
    /// Paths defined by more than one endpoint. Only the first was replayed.
    pub duplicate_endpoints: BTreeSet<String>,
}

impl ReplayOutcome {
    /// Total number of firing events.
    pub fn event_count(&self) -> usize {
        self.ticks.iter().map(|t| t.report.events.len()).sum()
    }
}

/// Replays samples against every endpoint of a document.
///
/// Samples are grouped into per-endpoint snapshots, and each endpoint keeps
/// its own breach store for the whole replay. When two endpoints share a
/// path the first one wins and the path is reported in
/// [`ReplayOutcome::duplicate_endpoints`].
pub fn replay(
    document: &HubDocument,
    samples: impl IntoIterator<Item = Sample>,
    stale_policy: StalePolicy,
) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    let mut workers: BTreeMap<&str, EndpointWorker> = BTreeMap::new();
    for endpoint in &document.endpoints {
        match workers.entry(endpoint.path.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(EndpointWorker::new(
                    endpoint.path.clone(),
                    endpoint.policies.clone(),
                    stale_policy,
                ));
            }
            Entry::Occupied(_) => {
                warn!(
                    endpoint = %endpoint.path,
                    "duplicate endpoint path, later definition ignored"
                );
                outcome.duplicate_endpoints.insert(endpoint.path.clone());
            }
        }
    }

    for grouped in group_samples(samples) {
        let Some(worker) = workers.get_mut(grouped.endpoint.as_str()) else {
            if outcome.unknown_endpoints.insert(grouped.endpoint.clone()) {
                warn!(endpoint = %grouped.endpoint, "samples for unknown endpoint ignored");
            }
            continue;
        };
        if let Some(report) = worker.process(&grouped.snapshot) {
            outcome.ticks.push(EndpointTick {
                endpoint: grouped.endpoint,
                report,
            });
        }
    }

    for worker in workers.values() {
        outcome.stats += worker.stats();
    }
    info!(
        snapshots = outcome.stats.snapshots,
        events = outcome.stats.events,
        errors = outcome.stats.errors,
        stale = outcome.stats.stale,
        "replay finished"
    );
    outcome
}
