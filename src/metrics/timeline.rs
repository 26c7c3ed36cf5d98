//! Per-resource allocation-interval timeline, for Gantt-style export.
//!
//! Grounded on `demo_timeline_export.py`'s confirmed
//! `export_resource_timeline()` shape:
//! `{resources: [{type, timeline: [{start, end, total, allocations}]}]}`.

use crate::resource::{ResourceKind, RESOURCE_KIND_COUNT};
use crate::time::Time;
use crate::tool::ToolInstance;
use std::collections::HashMap;

/// One closed span during which a resource's consumer set and shares held
/// steady.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AllocationInterval {
    /// Start of the interval.
    pub start: f64,
    /// End of the interval.
    pub end: f64,
    /// Sum of all shares allocated during the interval.
    pub total: f64,
    /// Per-consumer share, keyed by tool id (as a string, for JSON).
    pub allocations: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
struct OpenInterval {
    start: Time,
    allocations: HashMap<String, f64>,
}

/// Per-resource-kind list of closed intervals plus one possibly-open one.
#[derive(Debug)]
pub struct ResourceTimeline {
    closed: [Vec<AllocationInterval>; RESOURCE_KIND_COUNT],
    open: [Option<OpenInterval>; RESOURCE_KIND_COUNT],
}

impl ResourceTimeline {
    /// An empty timeline.
    #[must_use]
    pub fn new() -> Self {
        ResourceTimeline {
            closed: [Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new()],
            open: [None, None, None, None, None],
        }
    }

    /// Record the active set's allocations at `now`, closing and reopening
    /// an interval per kind whenever the allocation set changes.
    pub fn observe(&mut self, now: Time, active: &[&ToolInstance]) {
        for kind in ResourceKind::ALL {
            let mut allocations = HashMap::new();
            for tool in active {
                if tool.has_work_on(kind) {
                    allocations.insert(tool.id_string(), tool.current_share(kind));
                }
            }
            self.update_kind(kind, now, allocations);
        }
    }

    fn update_kind(&mut self, kind: ResourceKind, now: Time, allocations: HashMap<String, f64>) {
        let idx = kind.index();
        let changed = match &self.open[idx] {
            Some(open) => open.allocations != allocations,
            None => !allocations.is_empty(),
        };

        if !changed {
            return;
        }

        if let Some(open) = self.open[idx].take() {
            let total = open.allocations.values().sum();
            self.closed[idx].push(AllocationInterval {
                start: open.start.as_secs(),
                end: now.as_secs(),
                total,
                allocations: open.allocations,
            });
        }

        if !allocations.is_empty() {
            self.open[idx] = Some(OpenInterval { start: now, allocations });
        }
    }

    /// Close every still-open interval at `now`, so the export reflects a
    /// cancelled or horizon-limited run instead of leaving a dangling span.
    pub fn close_open_intervals(&mut self, now: Time) {
        for kind in ResourceKind::ALL {
            let idx = kind.index();
            if let Some(open) = self.open[idx].take() {
                let total = open.allocations.values().sum();
                self.closed[idx].push(AllocationInterval {
                    start: open.start.as_secs(),
                    end: now.as_secs(),
                    total,
                    allocations: open.allocations,
                });
            }
        }
    }

    /// Render the closed intervals (any still-open span is omitted — call
    /// [`ResourceTimeline::close_open_intervals`] first to include it).
    #[must_use]
    pub fn export(&self) -> TimelineExport {
        let resources = ResourceKind::ALL
            .into_iter()
            .map(|kind| ResourceTimelineEntry {
                kind: kind.as_str().to_string(),
                timeline: self.closed[kind.index()].clone(),
            })
            .collect();
        TimelineExport { resources }
    }
}

impl Default for ResourceTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// One resource's timeline, ready for `serde_json` serialisation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResourceTimelineEntry {
    /// The resource kind's canonical name, e.g. `"cpu"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Closed allocation intervals, in chronological order.
    pub timeline: Vec<AllocationInterval>,
}

/// The full export: `{resources: [...]}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelineExport {
    /// One entry per resource kind.
    pub resources: Vec<ResourceTimelineEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolTemplate;

    #[test]
    fn single_tool_produces_one_interval_once_closed() {
        let mut timeline = ResourceTimeline::new();
        let template = ToolTemplate::from_named_loads(&[("cpu", 10.0)]).unwrap();
        let mut tool = ToolInstance::new(template);
        tool.initialize_work(Time::ZERO);
        tool.set_current_share([10.0, 0.0, 0.0, 0.0, 0.0]);

        timeline.observe(Time::ZERO, &[&tool]);
        timeline.close_open_intervals(Time::from_secs(1.0));

        let export = timeline.export();
        let cpu = export.resources.iter().find(|r| r.kind == "cpu").unwrap();
        assert_eq!(cpu.timeline.len(), 1);
        assert_eq!(cpu.timeline[0].start, 0.0);
        assert_eq!(cpu.timeline[0].end, 1.0);
    }

    #[test]
    fn no_activity_yields_empty_timeline() {
        let timeline = ResourceTimeline::new();
        let export = timeline.export();
        for resource in &export.resources {
            assert!(resource.timeline.is_empty());
        }
    }
}
