//! Per-endpoint evaluation.
//!
//! An [`EndpointWorker`] owns the policy set and breach store of one endpoint.
//! It is the only writer of that store, so no locking is needed.

use crate::config::StalePolicy;
use crate::dispatch::EndpointEvent;
use hub_evaluator::{Error as EvalError, Evaluator, MemoryBreachStore, MetricSnapshot, TickReport};
use hub_policy::PolicySet;
use std::ops::AddAssign;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Counters kept while evaluating snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Snapshots evaluated.
    pub snapshots: u64,
    /// Firing events produced.
    pub events: u64,
    /// Policy outcomes with an error status.
    pub errors: u64,
    /// Snapshots skipped as older than the last tick.
    pub stale: u64,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.snapshots += other.snapshots;
        self.events += other.events;
        self.errors += other.errors;
        self.stale += other.stale;
    }
}

/// Messages accepted by a running worker.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Evaluate a snapshot.
    Snapshot(MetricSnapshot),
    /// Replace the policy set. Breach states of removed policies are dropped
    /// on the next tick.
    UpdatePolicies(PolicySet),
}

/// Evaluation state of one endpoint.
#[derive(Debug)]
pub struct EndpointWorker {
    path: String,
    policies: PolicySet,
    store: MemoryBreachStore,
    stale_policy: StalePolicy,
    evaluator: Evaluator,
    stats: WorkerStats,
}

impl EndpointWorker {
    /// Creates a worker with an empty breach store.
    #[must_use]
    pub fn new(path: impl Into<String>, policies: PolicySet, stale_policy: StalePolicy) -> Self {
        Self {
            path: path.into(),
            policies,
            store: MemoryBreachStore::new(),
            stale_policy,
            evaluator: Evaluator::new(),
            stats: WorkerStats::default(),
        }
    }

    /// Endpoint path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Replaces the policy set.
    pub fn update_policies(&mut self, policies: PolicySet) {
        info!(endpoint = %self.path, policies = policies.len(), "policy set replaced");
        self.policies = policies;
    }

    /// Evaluates one snapshot. Returns `None` if it was skipped as stale.
    pub fn process(&mut self, snapshot: &MetricSnapshot) -> Option<TickReport> {
        let report = match self.stale_policy {
            StalePolicy::Evaluate => self.evaluator.evaluate(&self.policies, snapshot, &mut self.store),
            StalePolicy::Skip => {
                match self
                    .evaluator
                    .evaluate_in_order(&self.policies, snapshot, &mut self.store)
                {
                    Ok(report) => report,
                    Err(EvalError::StaleSnapshot { snapshot, last }) => {
                        warn!(
                            endpoint = %self.path,
                            snapshot = %snapshot,
                            last = %last,
                            "skipping stale snapshot"
                        );
                        self.stats.stale += 1;
                        return None;
                    }
                }
            }
        };

        self.stats.snapshots += 1;
        self.stats.events += report.events.len() as u64;
        self.stats.errors += report.errors().count() as u64;
        Some(report)
    }

    /// Processes messages until the channel closes, forwarding firing events.
    ///
    /// Returns the final counters.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<WorkerMessage>,
        events: mpsc::Sender<EndpointEvent>,
    ) -> WorkerStats {
        debug!(endpoint = %self.path, "worker started");
        while let Some(message) = rx.recv().await {
            match message {
                WorkerMessage::UpdatePolicies(policies) => self.update_policies(policies),
                WorkerMessage::Snapshot(snapshot) => {
                    let Some(report) = self.process(&snapshot) else {
                        continue;
                    };
                    for event in report.events {
                        let event = EndpointEvent {
                            endpoint: self.path.clone(),
                            event,
                        };
                        if events.send(event).await.is_err() {
                            warn!(endpoint = %self.path, "dispatcher gone, dropping event");
                        }
                    }
                }
            }
        }
        debug!(endpoint = %self.path, snapshots = self.stats.snapshots, "worker stopped");
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use hub_policy::{Condition, Metric, Operator, Policy, Severity};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn policies() -> PolicySet {
        let mut set = PolicySet::new();
        set.insert(
            Policy::trigger("errors", "Server errors", Severity::Critical).with_condition(
                Condition::new(Metric::StatusCode, Operator::GreaterThan, "499"),
            ),
        )
        .unwrap();
        set
    }

    fn snapshot(minute: i64, status: f64) -> MetricSnapshot {
        MetricSnapshot::new(at(minute)).with(Metric::StatusCode, status)
    }

    #[test]
    fn stale_snapshots_are_skipped() {
        let mut worker = EndpointWorker::new("/v1/orders", policies(), StalePolicy::Skip);
        assert!(worker.process(&snapshot(5, 503.0)).is_some());
        assert!(worker.process(&snapshot(4, 503.0)).is_none());
        assert!(worker.process(&snapshot(5, 503.0)).is_some());

        let stats = worker.stats();
        assert_eq!(stats.snapshots, 2);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.events, 2);
    }

    #[test]
    fn stale_snapshots_can_be_evaluated() {
        let mut worker = EndpointWorker::new("/v1/orders", policies(), StalePolicy::Evaluate);
        worker.process(&snapshot(5, 200.0));
        let report = worker.process(&snapshot(4, 503.0)).unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(worker.stats().stale, 0);
    }

    #[test]
    fn policy_updates_take_effect() {
        let mut worker = EndpointWorker::new("/v1/orders", policies(), StalePolicy::Skip);
        worker.update_policies(PolicySet::new());
        let report = worker.process(&snapshot(0, 503.0)).unwrap();
        assert!(report.events.is_empty());
    }

    #[tokio::test]
    async fn running_worker_forwards_events() {
        let (tx, rx) = mpsc::channel(8);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let worker = EndpointWorker::new("/v1/orders", policies(), StalePolicy::Skip);
        let handle = tokio::spawn(worker.run(rx, events_tx));

        tx.send(WorkerMessage::Snapshot(snapshot(0, 200.0))).await.unwrap();
        tx.send(WorkerMessage::Snapshot(snapshot(1, 502.0))).await.unwrap();
        tx.send(WorkerMessage::UpdatePolicies(PolicySet::new())).await.unwrap();
        tx.send(WorkerMessage::Snapshot(snapshot(2, 502.0))).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.snapshots, 3);
        assert_eq!(stats.events, 1);

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.endpoint, "/v1/orders");
        assert_eq!(event.event.timestamp, at(1));
        assert!(events_rx.recv().await.is_none());
    }
}
