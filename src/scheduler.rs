//! Pure fair-share allocation functions: no mutable state of their own.
//!
//! Grounded on `simulation_engine.py`'s `_compute_resource_shares()` and
//! `_find_next_completion()`.

use crate::resource::{ResourceKind, ResourceTable, RESOURCE_KIND_COUNT};
use crate::time::Time;
use crate::tool::{ToolInstance, EPSILON};

/// Per-kind count of active tools that still have work on that axis.
///
/// Takes a slice of references rather than owned instances: the active set
/// spans tool instances owned by many different [`crate::request::Request`]
/// values, so the caller gathers references rather than handing over a
/// contiguous owned collection.
#[must_use]
pub fn consumer_counts(active: &[&ToolInstance]) -> [usize; RESOURCE_KIND_COUNT] {
    let mut counts = [0usize; RESOURCE_KIND_COUNT];
    for tool in active {
        for kind in ResourceKind::ALL {
            if tool.has_work_on(kind) {
                counts[kind.index()] += 1;
            }
        }
    }
    counts
}

/// The instantaneous fair share every consumer of `kind` receives:
/// `capacity(kind) / consumers(kind)`, or zero if nobody consumes it.
#[must_use]
pub fn fair_shares(table: &ResourceTable, counts: &[usize; RESOURCE_KIND_COUNT]) -> [f64; RESOURCE_KIND_COUNT] {
    let mut shares = [0.0; RESOURCE_KIND_COUNT];
    for kind in ResourceKind::ALL {
        let n = counts[kind.index()];
        if n > 0 {
            shares[kind.index()] = table.capacity(kind) / n as f64;
        }
    }
    shares
}

/// Recompute and write one tool's per-axis share, given the shares produced
/// by [`fair_shares`]. Must run for every active tool after any mutation of
/// the active set or any crossing of a remaining-work axis through ε, per
/// the scheduler's recomputation contract.
pub fn apply_share(tool: &mut ToolInstance, shares: &[f64; RESOURCE_KIND_COUNT]) {
    let mut assigned = [0.0; RESOURCE_KIND_COUNT];
    for kind in ResourceKind::ALL {
        if tool.has_work_on(kind) {
            assigned[kind.index()] = shares[kind.index()];
        }
    }
    tool.set_current_share(assigned);
}

/// The earliest simulated time at which any active tool finishes any
/// resource axis, given `now` and each tool's current share assignment.
///
/// Returns `Time::INFINITY` if no active tool has any (share, remaining)
/// pair with positive share and positive remaining work.
#[must_use]
pub fn next_completion(now: Time, active: &[&ToolInstance]) -> Time {
    let mut earliest = Time::INFINITY;
    for tool in active {
        for kind in ResourceKind::ALL {
            let remaining = tool.remaining(kind);
            let share = tool.current_share(kind);
            if remaining > EPSILON && share > 0.0 {
                let done = now + remaining / share;
                earliest = earliest.min(done);
            }
        }
    }
    earliest
}
