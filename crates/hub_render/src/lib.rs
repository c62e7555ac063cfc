//! Human and machine renderings of TSmart Hub endpoint definitions.
//!
//! Everything in this crate is a pure function of its input:
//! - [`describe`]: one-line projections of conditions, policies and events
//! - [`generate_report`]: markdown explanation of execution order
//! - [`Exporter`]: normalized YAML/JSON export, fingerprinted by [`Lockfile`]
//! - [`render_sdk`] / [`render_docs`]: client snippets and endpoint docs
//!
//! # Example
//!
//! ```rust,ignore
//! use hub_render::{Exporter, Lockfile};
//!
//! let exported = Exporter::new().export(&document)?;
//! Lockfile::new(&document, &source, &exported).save("hub.lock")?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::format_push_string)]

pub mod describe;
pub mod error;
pub mod exporter;
pub mod lockfile;
pub mod report;
pub mod templates;

pub use error::{Error, Result};
pub use exporter::{ExportOptions, Exporter, OutputFormat};
pub use lockfile::Lockfile;
pub use report::generate_report;
pub use templates::{render_docs, render_sdk, DocParams, DocPolicy, Language, SdkParams};
