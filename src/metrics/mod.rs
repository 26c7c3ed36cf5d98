//! Latency, throughput, utilisation, and timeline collection.
//!
//! Grounded on `metrics/collector.py`'s `MetricsCollector`: per-type
//! latency lists, per-step utilisation/consumer snapshots, time-weighted
//! utilisation averaging, and the numpy-style percentile statistics.

pub mod timeline;

use crate::request::Request;
use crate::resource::{ResourceKind, ResourceTable, RESOURCE_KIND_COUNT};
use crate::time::Time;
use crate::tool::ToolInstance;
use std::collections::HashMap;
pub use timeline::{AllocationInterval, ResourceTimeline, ResourceTimelineEntry, TimelineExport};

/// Per-group latency percentiles and moments, in seconds.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LatencyStats {
    /// Number of observations.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// 50th percentile (identical to `p50`).
    pub median: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// Minimum observation.
    pub min: f64,
    /// Maximum observation.
    pub max: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl LatencyStats {
    fn empty() -> Self {
        LatencyStats { count: 0, mean: 0.0, median: 0.0, p50: 0.0, p95: 0.0, p99: 0.0, min: 0.0, max: 0.0, std: 0.0 }
    }

    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::empty();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let std = variance.sqrt();

        LatencyStats {
            count,
            mean,
            median: percentile(&sorted, 50.0),
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            min: sorted[0],
            max: sorted[count - 1],
            std,
        }
    }
}

/// Linear-interpolation percentile, matching `numpy.percentile`'s default
/// (`linear`) method on an already-sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Throughput over the observed simulation span.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ThroughputStats {
    /// Number of completed requests counted.
    pub total_requests: usize,
    /// Effective duration, in seconds, the count was spread over.
    pub duration: f64,
    /// `total_requests / duration`.
    pub throughput_per_sec: f64,
    /// `throughput_per_sec * 60`.
    pub throughput_per_min: f64,
}

#[derive(Debug, Clone)]
struct UtilizationSnapshot {
    time: Time,
    utilization: [f64; RESOURCE_KIND_COUNT],
}

/// Accumulates per-run observations and derives statistics from them.
#[derive(Debug)]
pub struct MetricsCollector {
    latencies_by_type: HashMap<String, Vec<f64>>,
    completed_count: usize,
    snapshots: Vec<UtilizationSnapshot>,
    timeline: ResourceTimeline,
    simulation_start: Option<Time>,
    simulation_end: Option<Time>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// An empty collector.
    #[must_use]
    pub fn new() -> Self {
        MetricsCollector {
            latencies_by_type: HashMap::new(),
            completed_count: 0,
            snapshots: Vec::new(),
            timeline: ResourceTimeline::new(),
            simulation_start: None,
            simulation_end: None,
        }
    }

    /// Record a finished request's latency, grouped by its request type.
    pub fn record_completion(&mut self, request: &Request) {
        if let Some(latency) = request.latency() {
            self.latencies_by_type
                .entry(request.request_type().to_string())
                .or_default()
                .push(latency);
            self.completed_count += 1;
        }
    }

    /// Take a snapshot of per-resource utilisation and update the
    /// allocation-interval timeline. Called once per simulation step.
    pub fn snapshot(&mut self, now: Time, active: &[&ToolInstance], resources: &ResourceTable) {
        if self.simulation_start.is_none() {
            self.simulation_start = Some(now);
        }
        self.simulation_end = Some(now);

        let mut utilization = [0.0; RESOURCE_KIND_COUNT];
        for kind in ResourceKind::ALL {
            let capacity = resources.capacity(kind);
            let consumed: f64 = active
                .iter()
                .filter(|t| t.has_work_on(kind))
                .map(|t| t.current_share(kind))
                .sum();
            utilization[kind.index()] = consumed / capacity;
        }

        self.timeline.observe(now, active);
        self.snapshots.push(UtilizationSnapshot { time: now, utilization });
    }

    /// Latency statistics for one request type, or for everything if `None`.
    #[must_use]
    pub fn latency_statistics(&self, request_type: Option<&str>) -> LatencyStats {
        match request_type {
            Some(rt) => LatencyStats::from_samples(self.latencies_by_type.get(rt).map_or(&[][..], Vec::as_slice)),
            None => {
                let all: Vec<f64> = self.latencies_by_type.values().flatten().copied().collect();
                LatencyStats::from_samples(&all)
            }
        }
    }

    /// Throughput statistics for one request type, or for everything.
    #[must_use]
    pub fn throughput(&self, request_type: Option<&str>) -> ThroughputStats {
        let total_requests = match request_type {
            Some(rt) => self.latencies_by_type.get(rt).map_or(0, Vec::len),
            None => self.latencies_by_type.values().map(Vec::len).sum(),
        };

        let mut duration = match (self.simulation_start, self.simulation_end) {
            (Some(start), Some(end)) => end - start,
            _ => 1.0,
        };
        if duration <= 0.0 {
            duration = 1.0;
        }

        let throughput_per_sec = total_requests as f64 / duration;
        ThroughputStats {
            total_requests,
            duration,
            throughput_per_sec,
            throughput_per_min: throughput_per_sec * 60.0,
        }
    }

    /// Time-weighted average utilisation per resource kind across every
    /// pair of consecutive snapshots.
    #[must_use]
    pub fn resource_utilization(&self) -> [f64; RESOURCE_KIND_COUNT] {
        let mut result = [0.0; RESOURCE_KIND_COUNT];
        if self.snapshots.len() < 2 {
            return result;
        }
        for kind in ResourceKind::ALL {
            let mut weighted = 0.0;
            let mut total_time = 0.0;
            for window in self.snapshots.windows(2) {
                let (a, b) = (&window[0], &window[1]);
                let dt = b.time - a.time;
                weighted += a.utilization[kind.index()] * dt;
                total_time += dt;
            }
            result[kind.index()] = if total_time > 0.0 { weighted / total_time } else { 0.0 };
        }
        result
    }

    /// The highest per-snapshot utilisation observed for each resource kind
    /// across the whole run, as opposed to [`Self::resource_utilization`]'s
    /// time-weighted average. `peak_utilization()[k] <= 1.0` for every `k`
    /// is the conservation invariant (consumed `<=` capacity at every
    /// instant) restated in terms of what this collector already records.
    #[must_use]
    pub fn peak_utilization(&self) -> [f64; RESOURCE_KIND_COUNT] {
        let mut peak = [0.0; RESOURCE_KIND_COUNT];
        for snapshot in &self.snapshots {
            for kind in ResourceKind::ALL {
                peak[kind.index()] = peak[kind.index()].max(snapshot.utilization[kind.index()]);
            }
        }
        peak
    }

    /// The request types that have at least one recorded completion.
    pub fn request_types(&self) -> impl Iterator<Item = &str> {
        self.latencies_by_type.keys().map(String::as_str)
    }

    /// Total completed-request count across all types.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    /// Close any still-open timeline intervals at `now`. Must be called
    /// before [`MetricsCollector::export_resource_timeline`] if the run was
    /// cancelled mid-interval.
    pub fn finalize(&mut self, now: Time) {
        self.timeline.close_open_intervals(now);
    }

    /// Export the per-resource allocation timeline for visualisation.
    #[must_use]
    pub fn export_resource_timeline(&self) -> TimelineExport {
        self.timeline.export()
    }

    /// A full latency/throughput/utilisation summary, overall and per type.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let mut latency = HashMap::new();
        latency.insert("overall".to_string(), self.latency_statistics(None));
        let mut throughput = HashMap::new();
        throughput.insert("overall".to_string(), self.throughput(None));
        for request_type in self.request_types().map(str::to_string).collect::<Vec<_>>() {
            latency.insert(request_type.clone(), self.latency_statistics(Some(&request_type)));
            throughput.insert(request_type.clone(), self.throughput(Some(&request_type)));
        }

        let utilization = self.resource_utilization();
        let mut utilization_map = HashMap::new();
        for kind in ResourceKind::ALL {
            utilization_map.insert(kind.as_str().to_string(), utilization[kind.index()]);
        }

        MetricsSummary { latency, throughput, utilization: utilization_map }
    }
}

/// Serialisable summary: `{latency, throughput, utilization}` keyed by
/// request type plus `"overall"`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    /// Latency statistics keyed by `"overall"` and each request type.
    pub latency: HashMap<String, LatencyStats>,
    /// Throughput statistics keyed by `"overall"` and each request type.
    pub throughput: HashMap<String, ThroughputStats>,
    /// Time-weighted average utilisation fraction, keyed by resource name.
    pub utilization: HashMap<String, f64>,
}
