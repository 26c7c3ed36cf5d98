//! The closed set of resource kinds and the immutable capacity table.

use crate::error::{Result, SimError};
use std::fmt;

/// Capacity assigned to an unspecified resource kind (effectively unlimited).
///
/// Mirrors the original `ResourceManager.from_config` default: a kind absent
/// from the supplied configuration cannot stall any tool.
pub const UNLIMITED_CAPACITY: f64 = 1e12;

/// The number of distinct resource kinds.
pub const RESOURCE_KIND_COUNT: usize = 5;

/// A resource a tool may consume.
///
/// Closed by design (`SPEC_FULL.md` §9): the hot per-tool vectors are
/// fixed-size arrays indexed by `ResourceKind::index()`, not hash maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Compute cycles.
    Cpu,
    /// Neural processing unit cycles.
    Npu,
    /// Working memory.
    Memory,
    /// Network bandwidth.
    Network,
    /// Disk bandwidth.
    Disk,
}

impl ResourceKind {
    /// All resource kinds, in a stable order matching the backing arrays.
    pub const ALL: [ResourceKind; RESOURCE_KIND_COUNT] = [
        ResourceKind::Cpu,
        ResourceKind::Npu,
        ResourceKind::Memory,
        ResourceKind::Network,
        ResourceKind::Disk,
    ];

    /// The stable array index for this kind.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ResourceKind::Cpu => 0,
            ResourceKind::Npu => 1,
            ResourceKind::Memory => 2,
            ResourceKind::Network => 3,
            ResourceKind::Disk => 4,
        }
    }

    /// Parse a resource kind from its config/template name.
    ///
    /// Strict: returns `None` for anything outside the closed set. Callers
    /// that want a silently-permissive lookup (the `ResourceTable` config
    /// bridge) should not use this directly; see `crate::config`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<ResourceKind> {
        match name {
            "cpu" => Some(ResourceKind::Cpu),
            "npu" => Some(ResourceKind::Npu),
            "memory" => Some(ResourceKind::Memory),
            "network" => Some(ResourceKind::Network),
            "disk" => Some(ResourceKind::Disk),
            _ => None,
        }
    }

    /// The canonical lowercase name, matching `from_name`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Npu => "npu",
            ResourceKind::Memory => "memory",
            ResourceKind::Network => "network",
            ResourceKind::Disk => "disk",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable capacity per resource kind, fixed for the duration of a run.
#[derive(Debug, Clone, Copy)]
pub struct ResourceTable {
    capacities: [f64; RESOURCE_KIND_COUNT],
}

impl ResourceTable {
    /// Build a table from explicit capacities, one per kind in
    /// `ResourceKind::ALL` order. Every capacity must be strictly positive.
    pub fn new(capacities: [f64; RESOURCE_KIND_COUNT]) -> Result<Self> {
        for kind in ResourceKind::ALL {
            let capacity = capacities[kind.index()];
            if !(capacity > 0.0) {
                return Err(SimError::InvalidCapacity { kind, capacity });
            }
        }
        Ok(ResourceTable { capacities })
    }

    /// A table where every kind has the given capacity.
    pub fn uniform(capacity: f64) -> Result<Self> {
        Self::new([capacity; RESOURCE_KIND_COUNT])
    }

    /// The capacity of a single resource kind.
    #[must_use]
    pub fn capacity(&self, kind: ResourceKind) -> f64 {
        self.capacities[kind.index()]
    }

    /// Iterate every (kind, capacity) pair in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, f64)> + '_ {
        ResourceKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.capacity(kind)))
    }
}
