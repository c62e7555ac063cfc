//! Delivery of firing events.
//!
//! Workers never deliver events themselves: they send them over a channel to a
//! single dispatcher that owns a [`Dispatcher`] and runs on the blocking pool.

use crate::error::Result;
use hub_evaluator::FiringEvent;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A firing event tagged with its endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointEvent {
    /// Endpoint path.
    pub endpoint: String,
    /// The event.
    #[serde(flatten)]
    pub event: FiringEvent,
}

/// Delivers firing events to their destination.
pub trait Dispatcher: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. The event is not retried.
    fn dispatch(&mut self, event: &EndpointEvent) -> Result<()>;

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl Dispatcher for LogDispatcher {
    fn name(&self) -> &'static str {
        "log"
    }

    fn dispatch(&mut self, event: &EndpointEvent) -> Result<()> {
        let channels: Vec<_> = event.event.channels.iter().map(|c| c.as_str()).collect();
        info!(
            endpoint = %event.endpoint,
            policy = %event.event.policy_id,
            policy_type = %event.event.policy_type,
            severity = event.event.severity.map(|s| s.as_str()).unwrap_or("-"),
            channels = %channels.join(","),
            timestamp = %event.event.timestamp,
            "policy fired"
        );
        Ok(())
    }
}

/// Writes every event as one JSON line.
pub struct JsonLinesDispatcher<W: Write + Send> {
    writer: W,
}

impl JsonLinesDispatcher<BufWriter<std::fs::File>> {
    /// Appends to a file, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonLinesDispatcher<W> {
    /// Wraps a writer.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Dispatcher for JsonLinesDispatcher<W> {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn dispatch(&mut self, event: &EndpointEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Counters kept by the dispatcher task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events delivered.
    pub delivered: u64,
    /// Events that failed delivery.
    pub failed: u64,
}

/// Delivers events until every sender is dropped, then flushes.
///
/// Dispatchers may block on file or network I/O, so this loop blocks too. Run
/// it with [`tokio::task::spawn_blocking`], never on a runtime worker.
pub fn run_dispatcher(
    mut dispatcher: Box<dyn Dispatcher>,
    mut rx: mpsc::Receiver<EndpointEvent>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(event) = rx.blocking_recv() {
        match dispatcher.dispatch(&event) {
            Ok(()) => stats.delivered += 1,
            Err(e) => {
                stats.failed += 1;
                warn!(
                    dispatcher = dispatcher.name(),
                    policy = %event.event.policy_id,
                    error = %e,
                    "event delivery failed"
                );
            }
        }
    }
    if let Err(e) = dispatcher.flush() {
        warn!(dispatcher = dispatcher.name(), error = %e, "flush failed");
    }
    stats
}
