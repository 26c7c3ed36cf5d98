//! The discrete-event simulation loop.
//!
//! Grounded on `simulation_engine.py`'s `SimulationEngine`: `run()`,
//! `_compute_resource_shares()`/`_find_next_completion()` (delegated to
//! [`crate::scheduler`]), `_handle_request_arrival()`, `_handle_tool_start()`,
//! `_handle_resource_completion()`, and `_check_and_start_dependents()`.

use crate::dag::{DagTemplate, NodeId};
use crate::error::{Result, SimError};
use crate::event::{EventQueue, ToolRef};
use crate::metrics::MetricsCollector;
use crate::request::{Request, RequestId};
use crate::resource::ResourceTable;
use crate::scheduler;
use crate::time::Time;
use crate::tool::{ToolInstance, ToolStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace};

/// Owns every request, the active set, the event queue, and the metrics
/// collector for one simulation run.
#[derive(Debug)]
pub struct Simulator {
    resources: ResourceTable,
    requests: HashMap<RequestId, Request>,
    active: Vec<ToolRef>,
    events: EventQueue,
    completed: Vec<RequestId>,
    now: Time,
    total_steps: u64,
    metrics: MetricsCollector,
}

impl Simulator {
    /// Start a fresh simulation against a fixed resource table.
    #[must_use]
    pub fn new(resources: ResourceTable) -> Self {
        Simulator {
            resources,
            requests: HashMap::new(),
            active: Vec::new(),
            events: EventQueue::new(),
            completed: Vec::new(),
            now: Time::ZERO,
            total_steps: 0,
            metrics: MetricsCollector::new(),
        }
    }

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.now
    }

    /// Total steps taken across every `run()` call on this simulator.
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// The resource capacity table backing this run.
    #[must_use]
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// The metrics collected so far.
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// A previously submitted request, if it still exists.
    #[must_use]
    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(&id)
    }

    /// Identifiers of every request that has finished.
    #[must_use]
    pub fn completed_requests(&self) -> &[RequestId] {
        &self.completed
    }

    /// Admit a new request: create its tool instances, record its start
    /// time, and enqueue start events for every entry tool at
    /// `arrival_time`.
    ///
    /// `arrival_time` is the moment the request enters the system; it need
    /// not equal `now()` (a caller may submit a whole workload up front,
    /// as the out-of-scope arrival generator does).
    #[instrument(skip(self, dag), fields(request_type = %request_type.as_ref()))]
    pub fn submit(
        &mut self,
        request_type: impl AsRef<str>,
        arrival_time: Time,
        dag: Arc<DagTemplate>,
    ) -> RequestId {
        let mut request = Request::create(request_type.as_ref().to_string(), arrival_time, dag);
        request.mark_started(arrival_time);
        let id = request.id();
        let roots: Vec<NodeId> = request.root_nodes().to_vec();
        for root in roots {
            self.events.push(arrival_time, ToolRef { request_id: id, node: root });
        }
        debug!(request_id = ?id, arrival = %arrival_time, roots = roots_len(&request), "admitted request");
        self.requests.insert(id, request);
        id
    }

    /// Advance the simulation until the event queue and active set both
    /// empty, `until` is reached or exceeded, or `max_steps` steps have
    /// been taken within this call — whichever comes first.
    #[instrument(skip(self))]
    pub fn run(&mut self, until: Time, max_steps: u64) -> Result<()> {
        let mut steps_this_call = 0u64;
        loop {
            if steps_this_call >= max_steps {
                trace!(steps_this_call, "stopping: max_steps reached");
                break;
            }
            if self.now > until && self.active.is_empty() {
                break;
            }

            let t_next_start = self.events.peek_time().unwrap_or(Time::INFINITY);
            let t_next_done = self.next_completion();
            let t_next = t_next_start.min(t_next_done);

            if t_next.is_infinite() || t_next > until {
                break;
            }

            let elapsed = t_next - self.now;
            self.now = t_next;
            self.advance_active(elapsed);

            if t_next_start <= t_next_done {
                self.handle_start(t_next_start)?;
            } else {
                self.handle_completion(t_next)?;
            }

            self.metrics.snapshot(self.now, &self.active_instances(), &self.resources);
            steps_this_call += 1;
            self.total_steps += 1;
        }
        info!(total_steps = self.total_steps, now = %self.now, "run call finished");
        Ok(())
    }

    fn next_completion(&self) -> Time {
        let refs = self.active_instances();
        scheduler::next_completion(self.now, &refs)
    }

    fn active_instances(&self) -> Vec<&ToolInstance> {
        self.active
            .iter()
            .map(|r| {
                self.requests
                    .get(&r.request_id)
                    .expect("active tool references a known request")
                    .tool(r.node)
            })
            .collect()
    }

    /// Advance every active tool's remaining work by `elapsed` seconds at
    /// its current share. Must run once per step before dispatching the
    /// step's event, whether that event is a start or a completion —
    /// active tools keep consuming resources across a step boundary even
    /// when the step itself is triggered by an unrelated tool starting.
    fn advance_active(&mut self, elapsed: f64) {
        for tool_ref in self.active.clone() {
            let tool = self
                .requests
                .get_mut(&tool_ref.request_id)
                .expect("active tool references a known request")
                .tool_mut(tool_ref.node);
            tool.advance(elapsed);
        }
    }

    fn recompute_shares(&mut self) {
        let counts = scheduler::consumer_counts(&self.active_instances());
        let shares = scheduler::fair_shares(&self.resources, &counts);

        let targets = self.active.clone();
        for tool_ref in targets {
            let tool = self
                .requests
                .get_mut(&tool_ref.request_id)
                .expect("active tool references a known request")
                .tool_mut(tool_ref.node);
            scheduler::apply_share(tool, &shares);
        }
    }

    fn handle_start(&mut self, time: Time) -> Result<()> {
        let (_, tool_ref) = self.events.pop()?;

        {
            let request = self
                .requests
                .get(&tool_ref.request_id)
                .expect("event queue references a known request");
            if let Some(&blocking) = request
                .dependencies(tool_ref.node)
                .iter()
                .find(|&&dep| request.tool(dep).status() != ToolStatus::Completed)
            {
                return Err(SimError::DependencyViolation { node: tool_ref.node, blocking });
            }
        }

        let completed_immediately = {
            let request = self
                .requests
                .get_mut(&tool_ref.request_id)
                .expect("event queue references a known request");
            let tool = request.tool_mut(tool_ref.node);
            tool.initialize_work(time);
            tool.is_completed()
        };

        trace!(?tool_ref, %time, completed_immediately, "tool started");

        if completed_immediately {
            self.complete_and_release(tool_ref, time)?;
        } else {
            self.active.push(tool_ref);
            self.recompute_shares();
        }
        Ok(())
    }

    fn handle_completion(&mut self, time: Time) -> Result<()> {
        let newly_completed: Vec<ToolRef> = self
            .active
            .iter()
            .copied()
            .filter(|r| {
                self.requests
                    .get(&r.request_id)
                    .expect("active tool references a known request")
                    .tool(r.node)
                    .is_completed()
            })
            .collect();

        self.active.retain(|r| !newly_completed.contains(r));
        for &tool_ref in &newly_completed {
            self.finish_tool(tool_ref, time);
        }
        self.recompute_shares();

        // A diamond join (two predecessors completing in the same batch)
        // would otherwise see its dependent as `Pending` from both sides
        // and get scheduled twice; gather candidates across the whole
        // batch first and push each ready one exactly once.
        let mut candidates: Vec<ToolRef> = Vec::new();
        for &tool_ref in &newly_completed {
            let request = self
                .requests
                .get(&tool_ref.request_id)
                .expect("active tool references a known request");
            for &dep in request.dependents(tool_ref.node) {
                let candidate = ToolRef { request_id: tool_ref.request_id, node: dep };
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        for candidate in candidates {
            let request = self.requests.get(&candidate.request_id).expect("known request");
            if request.tool(candidate.node).status() == ToolStatus::Pending
                && request.can_start_tool(candidate.node)
            {
                self.events.push(time, candidate);
            }
        }

        let mut affected_requests: Vec<RequestId> = Vec::new();
        for &tool_ref in &newly_completed {
            if !affected_requests.contains(&tool_ref.request_id) {
                affected_requests.push(tool_ref.request_id);
            }
        }
        for request_id in affected_requests {
            self.check_request_completion(request_id, time);
        }
        Ok(())
    }

    fn check_request_completion(&mut self, request_id: RequestId, time: Time) {
        let request = self.requests.get_mut(&request_id).expect("known request");
        if request.is_completed() {
            request.mark_finished(time);
            self.completed.push(request_id);
            let request = self.requests.get(&request_id).expect("known request");
            info!(request_id = ?request_id, latency = ?request.latency(), "request completed");
            self.metrics.record_completion(request);
        }
    }

    fn finish_tool(&mut self, tool_ref: ToolRef, time: Time) {
        let request = self
            .requests
            .get_mut(&tool_ref.request_id)
            .expect("active tool references a known request");
        request.tool_mut(tool_ref.node).finish(time);
    }

    fn complete_and_release(&mut self, tool_ref: ToolRef, time: Time) -> Result<()> {
        self.finish_tool(tool_ref, time);
        self.release_dependents(tool_ref, time)
    }

    fn release_dependents(&mut self, tool_ref: ToolRef, time: Time) -> Result<()> {
        let request = self
            .requests
            .get(&tool_ref.request_id)
            .expect("active tool references a known request");
        let dependents: Vec<NodeId> = request.dependents(tool_ref.node).to_vec();

        for dep in dependents {
            let request = self.requests.get(&tool_ref.request_id).expect("known request");
            if request.tool(dep).status() == ToolStatus::Pending {
                if !request.can_start_tool(dep) {
                    continue;
                }
                self.events.push(time, ToolRef { request_id: tool_ref.request_id, node: dep });
            }
        }

        self.check_request_completion(tool_ref.request_id, time);
        Ok(())
    }
}

fn roots_len(request: &Request) -> usize {
    request.root_nodes().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use crate::tool::ToolTemplate;

    fn scenario_table() -> ResourceTable {
        let mut caps = [100.0; 5];
        caps[ResourceKind::Memory.index()] = 1000.0;
        ResourceTable::new(caps).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    /// Scenario 3 from `SPEC_FULL.md` §8: two independent roots A, B in a
    /// single request. Needs `DagTemplate::from_parts_for_test` since the
    /// public builder rejects multi-root graphs (see `DESIGN.md`'s Open
    /// Questions resolution 1).
    #[test]
    fn scenario_3_two_roots_share_cpu_until_one_finishes() {
        let a_template = ToolTemplate::from_named_loads(&[("cpu", 100.0), ("network", 50.0)]).unwrap();
        let b_template = ToolTemplate::from_named_loads(&[("cpu", 80.0)]).unwrap();
        let a = NodeId::from_raw(0);
        let b = NodeId::from_raw(1);
        let dag = Arc::new(DagTemplate::from_parts_for_test(
            vec!["a".to_string(), "b".to_string()],
            vec![a_template, b_template],
            vec![Vec::new(), Vec::new()],
            vec![Vec::new(), Vec::new()],
            vec![a, b],
        ));

        let mut sim = Simulator::new(scenario_table());
        let id = sim.submit("probe", Time::ZERO, dag);
        sim.run(Time::from_secs(10.0), 10_000).unwrap();

        let request = sim.request(id).unwrap();
        assert!(close(request.tool(a).finish_time().unwrap().as_secs(), 1.8));
        assert!(close(request.tool(b).finish_time().unwrap().as_secs(), 1.6));
        assert!(close(request.latency().unwrap(), 1.8));
    }

    #[test]
    fn max_steps_zero_is_a_no_op() {
        let mut builder = crate::dag::DagTemplateBuilder::new();
        builder.add_node("only", ToolTemplate::from_named_loads(&[("cpu", 100.0)]).unwrap());
        let dag = Arc::new(builder.build().unwrap());

        let mut sim = Simulator::new(scenario_table());
        sim.submit("probe", Time::ZERO, dag);
        sim.run(Time::from_secs(10.0), 0).unwrap();

        assert_eq!(sim.total_steps(), 0);
        assert_eq!(sim.now(), Time::ZERO);
    }

    #[test]
    fn dependency_violation_is_rejected() {
        let mut builder = crate::dag::DagTemplateBuilder::new();
        let a = builder.add_node("a", ToolTemplate::from_named_loads(&[("cpu", 1.0)]).unwrap());
        let b = builder.add_node("b", ToolTemplate::from_named_loads(&[("cpu", 1.0)]).unwrap());
        builder.add_edge(a, b);
        let dag = Arc::new(builder.build().unwrap());

        let mut sim = Simulator::new(scenario_table());
        let id = sim.submit("probe", Time::ZERO, dag);
        // Discard the auto-enqueued start event for root `a`, then force a
        // direct start event for `b` even though `a` hasn't run, bypassing
        // normal dependency release.
        sim.events.pop().unwrap();
        sim.events.push(Time::ZERO, ToolRef { request_id: id, node: b });

        let err = sim.handle_start(Time::ZERO).unwrap_err();
        assert!(matches!(err, SimError::DependencyViolation { .. }));
    }
}
