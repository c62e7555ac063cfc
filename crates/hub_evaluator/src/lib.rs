//! Condition, trigger and policy evaluation for TSmart Hub.
//!
//! The [`Evaluator`] runs an ordered [`PolicySet`](hub_policy::PolicySet)
//! against a [`MetricSnapshot`] once per tick. Conditions only fire after
//! they have held for their window; the per-condition [`BreachState`] lives
//! in a caller-owned [`BreachStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hub_evaluator::{Evaluator, MemoryBreachStore, MetricSnapshot};
//!
//! let mut store = MemoryBreachStore::new();
//! let snapshot = MetricSnapshot::new(now).with("response_time", 6200.0);
//! let report = Evaluator::new().evaluate(&endpoint.policies, &snapshot, &mut store);
//! for event in &report.events {
//!     println!("{} fired", event.policy_id);
//! }
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod breach;
pub mod checks;
pub mod condition;
pub mod error;
pub mod evaluator;
pub mod report;
pub mod snapshot;
pub mod store;
pub mod validate;

pub use breach::BreachState;
pub use condition::{Comparison, Exact, Predicate};
pub use error::{ConditionError, Error, Result};
pub use evaluator::{compile_policy, Evaluator};
pub use report::{ConditionFault, FiringEvent, PolicyOutcome, PolicyStatus, TickReport};
pub use snapshot::{MetricSnapshot, SampleValue};
pub use store::{BreachKey, BreachStore, MemoryBreachStore};
pub use validate::{validate, validate_endpoint, Level, Status, ValidationReport, Violation, Warning};
