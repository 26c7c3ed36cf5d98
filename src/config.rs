//! The configuration bridge to the out-of-scope external loader.
//!
//! This module owns no parsing (no file I/O, no YAML/JSON schema beyond the
//! struct shape below) — that remains the external configuration loader's
//! job. It exists only so a caller who already has a parsed document can
//! hand it to this crate without re-deriving the resource/tool-load
//! mapping logic. Grounded on `resource.py`'s `ResourceManager.from_config`,
//! which silently defaults any resource kind absent from the document to
//! an unlimited capacity.

use crate::error::Result;
use crate::resource::{ResourceKind, ResourceTable, UNLIMITED_CAPACITY};
use crate::tool::ToolTemplate;

/// A resource-capacity document: each field optional, absent fields
/// default to [`UNLIMITED_CAPACITY`].
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ResourceConfig {
    /// CPU capacity, in work units per second.
    pub cpu: Option<f64>,
    /// NPU capacity, in work units per second.
    pub npu: Option<f64>,
    /// Memory capacity, in work units per second.
    pub memory: Option<f64>,
    /// Network capacity, in work units per second.
    pub network: Option<f64>,
    /// Disk capacity, in work units per second.
    pub disk: Option<f64>,
}

impl ResourceConfig {
    /// Build a [`ResourceTable`], defaulting every unset *or non-positive*
    /// field to [`UNLIMITED_CAPACITY`] — unlike
    /// [`crate::tool::ToolTemplate::from_named_loads`], this constructor
    /// never rejects a config for naming an unrecognised resource, since
    /// the document shape itself is closed to the five known fields, and
    /// it never rejects one for a non-positive capacity either: mirroring
    /// `resource.py`'s `ResourceManager.from_config`, a supplied capacity
    /// is only honoured when `> 0`, otherwise the field is treated as if
    /// absent.
    pub fn into_table(self) -> Result<ResourceTable> {
        let resolve = |capacity: Option<f64>| capacity.filter(|&c| c > 0.0).unwrap_or(UNLIMITED_CAPACITY);
        let mut capacities = [UNLIMITED_CAPACITY; 5];
        capacities[ResourceKind::Cpu.index()] = resolve(self.cpu);
        capacities[ResourceKind::Npu.index()] = resolve(self.npu);
        capacities[ResourceKind::Memory.index()] = resolve(self.memory);
        capacities[ResourceKind::Network.index()] = resolve(self.network);
        capacities[ResourceKind::Disk.index()] = resolve(self.disk);
        ResourceTable::new(capacities)
    }
}

/// A single tool template's named loads, as they would appear embedded in
/// an external workload-specification document.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ToolLoadConfig {
    /// CPU load, in total work units.
    #[serde(default)]
    pub cpu: f64,
    /// NPU load, in total work units.
    #[serde(default)]
    pub npu: f64,
    /// Memory load, in total work units.
    #[serde(default)]
    pub memory: f64,
    /// Network load, in total work units.
    #[serde(default)]
    pub network: f64,
    /// Disk load, in total work units.
    #[serde(default)]
    pub disk: f64,
}

impl ToolLoadConfig {
    /// Build a [`ToolTemplate`] from this document. Every field defaults to
    /// zero rather than being omittable as "unknown"; there is no unknown-
    /// resource case here since the struct shape is already closed.
    pub fn into_template(self) -> Result<ToolTemplate> {
        ToolTemplate::from_named_loads(&[
            ("cpu", self.cpu),
            ("npu", self.npu),
            ("memory", self.memory),
            ("network", self.network),
            ("disk", self.disk),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_resource_defaults_to_unlimited() {
        let config = ResourceConfig { cpu: Some(100.0), ..Default::default() };
        let table = config.into_table().unwrap();
        assert_eq!(table.capacity(ResourceKind::Cpu), 100.0);
        assert_eq!(table.capacity(ResourceKind::Memory), UNLIMITED_CAPACITY);
    }

    #[test]
    fn non_positive_resource_defaults_to_unlimited_instead_of_erroring() {
        let config = ResourceConfig { cpu: Some(0.0), npu: Some(-5.0), ..Default::default() };
        let table = config.into_table().unwrap();
        assert_eq!(table.capacity(ResourceKind::Cpu), UNLIMITED_CAPACITY);
        assert_eq!(table.capacity(ResourceKind::Npu), UNLIMITED_CAPACITY);
    }

    #[test]
    fn tool_load_config_round_trips_into_template() {
        let config = ToolLoadConfig { cpu: 50.0, ..Default::default() };
        let template = config.into_template().unwrap();
        assert_eq!(template.load(ResourceKind::Cpu), 50.0);
        assert_eq!(template.load(ResourceKind::Network), 0.0);
    }
}
