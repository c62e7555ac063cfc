//! Typed policy model and TOON endpoint format for TSmart Hub.
//!
//! This crate provides:
//! - Conditions, policies and triggers with type-specific payloads
//! - Ordered policy sets with deterministic execution order
//! - Endpoint definitions and multi-endpoint documents (TOON, YAML, JSON)
//!
//! # Example
//!
//! ```rust,ignore
//! use hub_policy::{parse, PolicyType};
//!
//! let endpoint = parse(&std::fs::read_to_string("endpoint.toon")?)?;
//! for policy in endpoint.policies.ordered() {
//!     println!("{} {}", policy.kind(), policy.name);
//! }
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod endpoint;
pub mod error;
pub mod model;
pub mod parser;
pub mod set;

pub use endpoint::{load_document, Backend, EndpointDefinition, HttpMethod, HubDocument, RetryPolicy};
pub use error::{Error, Result};
pub use model::{
    AuthScheme, AuthenticationConfig, AuthorizationConfig, CachingConfig, Channel, Condition,
    MatchMode, Metric, MetricKind, MonitoringConfig, Operator, Policy, PolicyConfig, PolicyId,
    PolicyType, RateLimitConfig, Schedule, SecurityConfig, Severity, TransformationConfig,
};
pub use parser::{parse, parse_condition, serialize};
pub use set::PolicySet;
