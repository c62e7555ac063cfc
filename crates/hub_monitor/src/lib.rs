//! Sample ingestion, replay and live trigger monitoring for TSmart Hub.
//!
//! Samples arrive as CSV or JSON lines and are grouped into per-endpoint
//! [`MetricSnapshot`](hub_evaluator::MetricSnapshot)s. [`replay`] evaluates a
//! recorded stream synchronously; [`Monitor`] runs one worker task per
//! endpoint and hands firing events to a [`Dispatcher`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hub_monitor::{Monitor, MonitorConfig};
//!
//! let config = MonitorConfig::load("hub.yaml")?;
//! let document = config.load_documents()?;
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! let stats = Monitor::new(document, config).run(stdin).await?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod monitor;
pub mod replay;
pub mod sample;
pub mod worker;

pub use config::{DispatcherKind, MonitorConfig, StalePolicy};
pub use decode::{CsvDecoder, DecoderRegistry, JsonLinesDecoder, SampleDecoder};
pub use dispatch::{
    run_dispatcher, DispatchStats, Dispatcher, EndpointEvent, JsonLinesDispatcher, LogDispatcher,
};
pub use error::{Error, Result};
pub use monitor::{Monitor, MonitorStats};
pub use replay::{replay, EndpointTick, ReplayOutcome};
pub use sample::{group_samples, EndpointSnapshot, Sample, SnapshotBatcher};
pub use worker::{EndpointWorker, WorkerMessage, WorkerStats};
