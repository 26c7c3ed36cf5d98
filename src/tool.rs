//! Tool templates and their per-request runtime instances.

use crate::error::{Result, SimError};
use crate::resource::{ResourceKind, RESOURCE_KIND_COUNT};
use crate::time::Time;
use std::sync::atomic::{AtomicU64, Ordering};

/// Completion and work-remaining comparisons tolerate this much slack.
pub const EPSILON: f64 = 1e-9;

/// Lifecycle state of a [`ToolInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ToolStatus {
    /// Created but not yet admitted to the active set.
    Pending,
    /// Currently consuming shared resources.
    Running,
    /// All resource axes have reached zero remaining work.
    Completed,
}

/// Immutable per-node workload descriptor: total work units required on
/// each resource axis to finish the tool.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolTemplate {
    loads: [f64; RESOURCE_KIND_COUNT],
}

impl ToolTemplate {
    /// Build a template directly from a load vector in `ResourceKind::ALL`
    /// order. Every load must be non-negative.
    pub fn new(loads: [f64; RESOURCE_KIND_COUNT]) -> Result<Self> {
        for kind in ResourceKind::ALL {
            let load = loads[kind.index()];
            if load < 0.0 {
                return Err(SimError::InvalidCapacity { kind, capacity: load });
            }
        }
        Ok(ToolTemplate { loads })
    }

    /// A template with zero load on every axis.
    #[must_use]
    pub fn idle() -> Self {
        ToolTemplate { loads: [0.0; RESOURCE_KIND_COUNT] }
    }

    /// Build a template from named (resource, load) pairs.
    ///
    /// Strict, unlike [`crate::config::ResourceConfig`]'s permissive
    /// string lookup: any name outside the closed resource set fails with
    /// `UnknownResource`. This models the external tool-taxonomy
    /// boundary, which must reject typos rather than silently ignore them.
    pub fn from_named_loads(pairs: &[(&str, f64)]) -> Result<Self> {
        let mut loads = [0.0; RESOURCE_KIND_COUNT];
        for &(name, load) in pairs {
            let kind = ResourceKind::from_name(name)
                .ok_or_else(|| SimError::UnknownResource { name: name.to_string() })?;
            if load < 0.0 {
                return Err(SimError::InvalidCapacity { kind, capacity: load });
            }
            loads[kind.index()] = load;
        }
        Ok(ToolTemplate { loads })
    }

    /// The total work units required on the given axis.
    #[must_use]
    pub fn load(&self, kind: ResourceKind) -> f64 {
        self.loads[kind.index()]
    }
}

/// Stable identifier for a tool instance, unique within a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ToolId(u64);

static NEXT_TOOL_ID: AtomicU64 = AtomicU64::new(0);

impl ToolId {
    /// Allocate the next tool identifier. Monotonic within process lifetime.
    #[must_use]
    pub fn next() -> Self {
        ToolId(NEXT_TOOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The runtime projection of a [`ToolTemplate`] for one node of one request.
#[derive(Debug, Clone)]
pub struct ToolInstance {
    id: ToolId,
    template: ToolTemplate,
    status: ToolStatus,
    remaining: [f64; RESOURCE_KIND_COUNT],
    current_share: [f64; RESOURCE_KIND_COUNT],
    start_time: Option<Time>,
    finish_time: Option<Time>,
}

impl ToolInstance {
    /// Create a pending tool instance from a template. Work is not
    /// initialised until [`ToolInstance::initialize_work`] is called.
    #[must_use]
    pub fn new(template: ToolTemplate) -> Self {
        ToolInstance {
            id: ToolId::next(),
            template,
            status: ToolStatus::Pending,
            remaining: [0.0; RESOURCE_KIND_COUNT],
            current_share: [0.0; RESOURCE_KIND_COUNT],
            start_time: None,
            finish_time: None,
        }
    }

    /// This instance's stable identifier.
    #[must_use]
    pub fn id(&self) -> ToolId {
        self.id
    }

    /// A string rendering of the id, for use as a JSON object key in
    /// timeline/metrics export.
    #[must_use]
    pub fn id_string(&self) -> String {
        self.id.0.to_string()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ToolStatus {
        self.status
    }

    /// The template this instance was created from.
    #[must_use]
    pub fn template(&self) -> ToolTemplate {
        self.template
    }

    /// Copy the template's loads into `remaining` and mark the instance
    /// running. Must be called exactly once, when the tool is admitted to
    /// the active set.
    pub fn initialize_work(&mut self, now: Time) {
        self.remaining = self.template.loads;
        self.status = ToolStatus::Running;
        self.start_time = Some(now);
    }

    /// Remaining work on a given axis.
    #[must_use]
    pub fn remaining(&self, kind: ResourceKind) -> f64 {
        self.remaining[kind.index()]
    }

    /// True if this instance still has (more than ε) work left on `kind`.
    #[must_use]
    pub fn has_work_on(&self, kind: ResourceKind) -> bool {
        self.remaining[kind.index()] > EPSILON
    }

    /// True once every axis has reached zero (within ε) remaining work.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        ResourceKind::ALL.iter().all(|&kind| self.remaining[kind.index()] <= EPSILON)
    }

    /// The allocator's most recently assigned instantaneous rate on `kind`.
    #[must_use]
    pub fn current_share(&self, kind: ResourceKind) -> f64 {
        self.current_share[kind.index()]
    }

    /// Overwrite the share vector. Called by the scheduler whenever the
    /// active set changes.
    pub fn set_current_share(&mut self, shares: [f64; RESOURCE_KIND_COUNT]) {
        self.current_share = shares;
    }

    /// Subtract `share(kind) * elapsed` from remaining work on every axis,
    /// clamped at zero to avoid floating-point drift going negative.
    pub fn advance(&mut self, elapsed: f64) {
        for kind in ResourceKind::ALL {
            let idx = kind.index();
            let consumed = self.current_share[idx] * elapsed;
            self.remaining[idx] = (self.remaining[idx] - consumed).max(0.0);
        }
    }

    /// Mark the instance completed at `now` and clear its share vector.
    pub fn finish(&mut self, now: Time) {
        self.status = ToolStatus::Completed;
        self.finish_time = Some(now);
        self.current_share = [0.0; RESOURCE_KIND_COUNT];
    }

    /// When this instance started running, if it has.
    #[must_use]
    pub fn start_time(&self) -> Option<Time> {
        self.start_time
    }

    /// When this instance finished, if it has.
    #[must_use]
    pub fn finish_time(&self) -> Option<Time> {
        self.finish_time
    }
}

impl PartialEq for ToolInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ToolInstance {}

impl std::hash::Hash for ToolInstance {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
