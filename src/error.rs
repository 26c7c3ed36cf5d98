//! Error taxonomy for the simulation kernel.

use crate::resource::ResourceKind;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Everything that can go wrong constructing or running a simulation.
///
/// Steady-state stepping of [`crate::simulation::Simulator`] never raises;
/// every variant here originates at construction, admission, or from
/// programmer misuse of the public API.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    /// A resource capacity was not strictly positive.
    #[error("resource {kind} has non-positive capacity {capacity}")]
    InvalidCapacity {
        /// The resource kind with the bad capacity.
        kind: ResourceKind,
        /// The offending capacity value.
        capacity: f64,
    },

    /// A DAG template failed cycle, single-entry, or reachability validation.
    #[error("malformed dependency graph: {reason}")]
    MalformedGraph {
        /// Human-readable description of the validation failure.
        reason: String,
    },

    /// A tool template referenced a resource name outside the closed set.
    #[error("unknown resource kind: {name}")]
    UnknownResource {
        /// The offending resource name.
        name: String,
    },

    /// A tool was asked to start before all of its predecessors completed.
    #[error("tool {node:?} cannot start: predecessor {blocking:?} is not completed")]
    DependencyViolation {
        /// The node that was asked to start.
        node: crate::dag::NodeId,
        /// A predecessor of `node` that has not completed.
        blocking: crate::dag::NodeId,
    },

    /// Pop was called on an empty event queue.
    #[error("event queue is empty")]
    EmptyQueue,
}
