//! Live monitoring.
//!
//! The monitor reads samples line by line, groups them into per-endpoint
//! snapshots and routes each snapshot to the worker task owning that endpoint.
//! Workers forward firing events to one dispatcher task.
//!
//! ```text
//! input ─► decoder ─► batcher ─┬─► worker /v1/orders ─┐
//!                              └─► worker /v1/users  ─┴─► dispatcher
//! ```

use crate::config::{DispatcherKind, MonitorConfig};
use crate::decode::{DecoderRegistry, SampleDecoder};
use crate::dispatch::{
    run_dispatcher, DispatchStats, Dispatcher, EndpointEvent, JsonLinesDispatcher, LogDispatcher,
};
use crate::error::{Error, Result};
use crate::sample::{EndpointSnapshot, SnapshotBatcher};
use crate::worker::{EndpointWorker, WorkerMessage, WorkerStats};
use hub_policy::HubDocument;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters reported when the monitor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Input lines read.
    pub lines: u64,
    /// Samples decoded.
    pub samples: u64,
    /// Lines that failed to decode.
    pub decode_errors: u64,
    /// Snapshots for endpoints without a worker.
    pub unrouted: u64,
    /// Aggregated worker counters.
    pub workers: WorkerStats,
    /// Dispatcher counters.
    pub dispatch: DispatchStats,
    /// True if the monitor stopped on a shutdown signal rather than end of input.
    pub interrupted: bool,
}

impl MonitorStats {
    fn log(&self) {
        info!(
            lines = self.lines,
            samples = self.samples,
            snapshots = self.workers.snapshots,
            events = self.workers.events,
            errors = self.workers.errors,
            stale = self.workers.stale,
            decode_errors = self.decode_errors,
            delivered = self.dispatch.delivered,
            failed = self.dispatch.failed,
            interrupted = self.interrupted,
            "monitor stopped"
        );
    }
}

/// Runs one worker per endpoint of a document.
pub struct Monitor {
    document: HubDocument,
    config: MonitorConfig,
    registry: DecoderRegistry,
    dispatcher: Option<Box<dyn Dispatcher>>,
}

struct Router {
    senders: BTreeMap<String, mpsc::Sender<WorkerMessage>>,
    unknown: BTreeSet<String>,
    unrouted: u64,
}

impl Router {
    async fn route(&mut self, grouped: EndpointSnapshot) -> Result<()> {
        let Some(sender) = self.senders.get(&grouped.endpoint) else {
            self.unrouted += 1;
            if self.unknown.insert(grouped.endpoint.clone()) {
                warn!(endpoint = %grouped.endpoint, "samples for unknown endpoint ignored");
            }
            return Ok(());
        };
        sender
            .send(WorkerMessage::Snapshot(grouped.snapshot))
            .await
            .map_err(|_| Error::Task(format!("worker for '{}' stopped", grouped.endpoint)))
    }
}

impl Monitor {
    /// Creates a monitor. The dispatcher is built from `config` unless one is
    /// supplied with [`Monitor::with_dispatcher`].
    #[must_use]
    pub fn new(document: HubDocument, config: MonitorConfig) -> Self {
        Self {
            document,
            config,
            registry: DecoderRegistry::new(),
            dispatcher: None,
        }
    }

    /// Uses the given dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Box<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Uses the given decoder registry.
    #[must_use]
    pub fn with_registry(mut self, registry: DecoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Runs until end of input or Ctrl+C.
    ///
    /// # Errors
    ///
    /// See [`Monitor::run_until`].
    pub async fn run<R>(self, input: R) -> Result<MonitorStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("cannot listen for Ctrl+C, running until end of input");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(input, ctrl_c).await
    }

    /// Runs until end of input or until `shutdown` completes.
    ///
    /// Pending snapshots are flushed and every queued event is delivered
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, two endpoints share a
    /// path, the input cannot be read, its format is unknown, or a task fails.
    pub async fn run_until<R, F>(self, input: R, shutdown: F) -> Result<MonitorStats>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        self.config.validate()?;
        self.document.ensure_unique_paths()?;
        let Self {
            document,
            config,
            registry,
            dispatcher,
        } = self;
        let dispatcher = match dispatcher {
            Some(dispatcher) => dispatcher,
            None => build_dispatcher(&config)?,
        };

        let (events_tx, events_rx) = mpsc::channel::<EndpointEvent>(config.channel_capacity);
        let dispatcher_name = dispatcher.name();
        let dispatch_task =
            tokio::task::spawn_blocking(move || run_dispatcher(dispatcher, events_rx));

        let (mut router, workers) = spawn_workers(document, &config, &events_tx);
        drop(events_tx);
        info!(
            endpoints = workers.len(),
            dispatcher = dispatcher_name,
            "monitor started"
        );

        let mut stats = MonitorStats::default();
        let mut batcher = SnapshotBatcher::new();
        let mut decoder: Option<&dyn SampleDecoder> = None;
        let mut lines = input.lines();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    stats.interrupted = true;
                    break;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("end of input");
                        break;
                    };
                    stats.lines += 1;
                    if line.trim().is_empty() {
                        continue;
                    }

                    let active = match decoder {
                        Some(active) => active,
                        None => {
                            let detected = registry.detect(config.sample_format.as_deref(), &line)?;
                            info!(format = detected.format_name(), "reading samples");
                            decoder = Some(detected);
                            detected
                        }
                    };

                    match active.decode_line(&line) {
                        Ok(Some(sample)) => {
                            stats.samples += 1;
                            if let Some(grouped) = batcher.push(sample) {
                                router.route(grouped).await?;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            stats.decode_errors += 1;
                            warn!(line = stats.lines, error = %e, "skipping undecodable line");
                        }
                    }
                }
            }
        }

        for grouped in batcher.flush() {
            router.route(grouped).await?;
        }
        stats.unrouted = router.unrouted;
        drop(router);

        for handle in workers {
            stats.workers += handle.await.map_err(|e| Error::Task(e.to_string()))?;
        }
        stats.dispatch = dispatch_task
            .await
            .map_err(|e| Error::Task(e.to_string()))?;

        stats.log();
        Ok(stats)
    }
}

fn spawn_workers(
    document: HubDocument,
    config: &MonitorConfig,
    events: &mpsc::Sender<EndpointEvent>,
) -> (Router, Vec<JoinHandle<WorkerStats>>) {
    let mut router = Router {
        senders: BTreeMap::new(),
        unknown: BTreeSet::new(),
        unrouted: 0,
    };
    let mut workers = Vec::with_capacity(document.endpoints.len());
    for endpoint in document.endpoints {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let worker = EndpointWorker::new(endpoint.path.clone(), endpoint.policies, config.stale_policy);
        workers.push(tokio::spawn(worker.run(rx, events.clone())));
        router.senders.insert(endpoint.path, tx);
    }
    (router, workers)
}

fn build_dispatcher(config: &MonitorConfig) -> Result<Box<dyn Dispatcher>> {
    match config.dispatcher {
        DispatcherKind::Log => Ok(Box::new(LogDispatcher)),
        DispatcherKind::Jsonl => {
            let path = config
                .events_path
                .as_ref()
                .ok_or_else(|| Error::Config("dispatcher 'jsonl' requires events_path".to_string()))?;
            Ok(Box::new(JsonLinesDispatcher::append(path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_policy::{
        Backend, Condition, EndpointDefinition, Metric, Operator, Policy, PolicyId, Severity,
    };
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<EndpointEvent>>>);

    impl Dispatcher for Collect {
        fn name(&self) -> &'static str {
            "collect"
        }

        fn dispatch(&mut self, event: &EndpointEvent) -> Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn document() -> HubDocument {
        let mut orders = EndpointDefinition::new("/v1/orders", Backend::new("https://orders.internal"));
        orders
            .policies
            .insert(
                Policy::trigger("slow", "Slow responses", Severity::High).with_condition(
                    Condition::new(Metric::ResponseTime, Operator::GreaterThan, "5000")
                        .sustained_for(2),
                ),
            )
            .unwrap();
        HubDocument::from(orders)
    }

    fn csv(minutes: std::ops::RangeInclusive<u32>, value: u32) -> String {
        let mut input = String::from("timestamp,endpoint,metric,value\n");
        for minute in minutes {
            input.push_str(&format!(
                "2024-01-15T09:{minute:02}:00Z,/v1/orders,response_time,{value}\n"
            ));
        }
        input
    }

    #[tokio::test]
    async fn live_monitor_fires_and_delivers() {
        let collect = Collect::default();
        let input = csv(0..=3, 6000);

        let stats = Monitor::new(document(), MonitorConfig::default())
            .with_dispatcher(Box::new(collect.clone()))
            .run_until(input.as_bytes(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.samples, 4);
        assert_eq!(stats.workers.snapshots, 4);
        assert_eq!(stats.workers.events, 2);
        assert_eq!(stats.dispatch.delivered, 2);
        assert!(!stats.interrupted);

        let events = collect.0.lock().unwrap();
        assert!(events.iter().all(|e| e.event.policy_id == PolicyId::from("slow")));
        assert_eq!(events[0].endpoint, "/v1/orders");
    }

    #[tokio::test]
    async fn bad_lines_and_unknown_endpoints_are_counted() {
        let input = "timestamp,endpoint,metric,value
2024-01-15T09:00:00Z,/v1/orders,response_time,100
not-a-time,/v1/orders,response_time,100
2024-01-15T09:00:00Z,/v1/other,response_time,100
";
        let stats = Monitor::new(document(), MonitorConfig::default())
            .with_dispatcher(Box::new(Collect::default()))
            .run_until(input.as_bytes(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.unrouted, 1);
        assert_eq!(stats.workers.snapshots, 1);
        assert_eq!(stats.workers.events, 0);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_reading() {
        let stats = Monitor::new(document(), MonitorConfig::default())
            .with_dispatcher(Box::new(Collect::default()))
            .run_until(tokio::io::empty(), async {})
            .await
            .unwrap();
        assert_eq!(stats.lines, 0);
    }

    #[tokio::test]
    async fn shared_endpoint_path_is_refused() {
        let mut doc = document();
        doc.endpoints.push(EndpointDefinition::new("/v1/orders", Backend::new("https://b")));
        let result = Monitor::new(doc, MonitorConfig::default())
            .with_dispatcher(Box::new(Collect::default()))
            .run_until(csv(0..=1, 6000).as_bytes(), std::future::pending())
            .await;
        assert!(matches!(
            result,
            Err(Error::Policy(hub_policy::Error::DuplicateEndpoint(_)))
        ));
    }

    #[tokio::test]
    async fn unknown_format_is_an_error() {
        let result = Monitor::new(document(), MonitorConfig::default())
            .with_dispatcher(Box::new(Collect::default()))
            .run_until("<xml/>\n".as_bytes(), std::future::pending())
            .await;
        assert!(matches!(result, Err(Error::UnknownFormat(_))));
    }
}
