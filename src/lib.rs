//! # flowguard
//!
//! An in-process traffic-governance runtime: it intercepts calls to named
//! resources and decides, per call, whether the call proceeds, is delayed, or
//! is rejected. Decisions are driven by real-time per-resource metrics
//! collected in sliding windows, and by rules configured per resource: flow
//! control with several shaping strategies, circuit breaking, hot-parameter
//! flow control, and origin authority. An optional cluster mode centralizes
//! quota accounting at a token server.
//!
//! Every guarded call traverses a chain of slots (`base::SlotChain`):
//! prepare slots resolve the statistic nodes, rule-check slots gate the call,
//! and statistic slots record the outcome. Generally there are several steps
//! when guarding a resource:
//! 1. Initialize the runtime once, e.g. `init_default()`.
//! 2. Load the rules defined for each resource.
//! 3. Build an entry at the call site and exit it when the call finished.
//!
//! ## Guarding a call
//!
//! If the call is rejected, `build()` returns the block error and no exit is
//! needed:
//!
//! ```rust
//! use flowguard::{base, EntryBuilder};
//!
//! let entry_builder = EntryBuilder::new("example".into())
//!     .with_traffic_type(base::TrafficType::Inbound);
//! if let Ok(entry) = entry_builder.build() {
//!     // the request is allowed; run the business logic, then exit
//!     entry.exit().unwrap();
//! } else {
//!     // the request is blocked
//! }
//! ```
//!
//! ## Loading rules
//!
//! ```rust
//! use std::sync::Arc;
//! use flowguard::flow;
//!
//! flow::load_rules(vec![Arc::new(flow::Rule {
//!     resource: "example".into(),
//!     threshold: 10.0,
//!     ..Default::default()
//! })]);
//! ```
//!
//! Rules take effect atomically per resource; reloading an identical set is
//! a no-op.

/// The topmost user API.
pub mod api;
/// Core implementations: the statistic substrate (sliding windows over the
/// bucket rings), the node family, the slot chain, the rule checkers, and
/// the cluster token service abstraction.
pub mod core;
/// Adapters for logging facades.
pub mod logging;
/// Utility functions: clocks, sleeps, casting.
pub mod utils;

// re-export preludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
