//! A discrete-event simulator for agentic request pipelines.
//!
//! A workload of requests, each a DAG of tool invocations, contends for a
//! fixed pool of typed resources (CPU, NPU, memory, network, disk) under
//! an idealised fair-share allocation policy. The simulator advances
//! simulated time event by event rather than tick by tick: completion
//! times are predicted analytically from the current fair-share
//! assignment rather than discovered by polling, so a run costs one step
//! per state change, not one step per unit of wall-clock-equivalent time.
//!
//! The crate is organised bottom-up:
//!
//! - [`resource`] — the closed resource-kind enum and the capacity table.
//! - [`tool`] — tool templates (workload descriptors) and their per-request
//!   runtime instances.
//! - [`dag`] — the dependency-graph builder and validator.
//! - [`request`] — a request: a DAG template plus its tool instances.
//! - [`event`] — the pending-start event queue.
//! - [`scheduler`] — the pure fair-share allocation and completion-oracle
//!   functions.
//! - [`simulation`] — [`simulation::Simulator`], which ties the above
//!   together into the event loop.
//! - [`metrics`] — latency, throughput, utilisation, and timeline
//!   collection.
//! - [`config`] — the bridge from an externally-parsed configuration
//!   document to [`resource::ResourceTable`]/[`tool::ToolTemplate`].
//! - [`error`] — the [`error::SimError`] taxonomy and [`error::Result`]
//!   alias returned by every fallible constructor and by
//!   [`simulation::Simulator::run`].
//!
//! Out of scope, by design: the tool taxonomy and configuration loader
//! that produce [`dag::DagTemplate`]s and [`tool::ToolTemplate`]s, the
//! Poisson arrival generator, and any visualisation or CLI layer. This
//! crate consumes validated graphs and emits metrics; it does not decide
//! what a workload looks like or render the result.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dag;
pub mod error;
pub mod event;
pub mod metrics;
pub mod request;
pub mod resource;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod tool;

pub use error::{Result, SimError};
pub use metrics::{MetricsCollector, MetricsSummary};
pub use request::{Request, RequestId};
pub use resource::{ResourceKind, ResourceTable};
pub use simulation::Simulator;
pub use time::Time;
pub use tool::{ToolInstance, ToolStatus, ToolTemplate};
