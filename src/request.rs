//! Requests: a DAG template paired with per-run tool instances.

use crate::dag::{DagTemplate, NodeId};
use crate::time::Time;
use crate::tool::{ToolInstance, ToolStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identifier for a request, unique within a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct RequestId(u64);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

impl RequestId {
    /// Allocate the next request identifier.
    #[must_use]
    pub fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A user request executing a DAG of tools.
#[derive(Debug)]
pub struct Request {
    id: RequestId,
    request_type: String,
    arrival_time: Time,
    dag: Arc<DagTemplate>,
    tools: Vec<ToolInstance>,
    start_time: Option<Time>,
    finish_time: Option<Time>,
}

impl Request {
    /// Create a request with one freshly-initialised (pending) tool
    /// instance per node of `dag`.
    #[must_use]
    pub fn create(request_type: impl Into<String>, arrival_time: Time, dag: Arc<DagTemplate>) -> Self {
        let tools = dag
            .nodes()
            .map(|node| ToolInstance::new(dag.template(node)))
            .collect();
        Request {
            id: RequestId::next(),
            request_type: request_type.into(),
            arrival_time,
            dag,
            tools,
            start_time: None,
            finish_time: None,
        }
    }

    /// This request's stable identifier.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The request-type tag used for metric grouping.
    #[must_use]
    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    /// When this request entered the system.
    #[must_use]
    pub fn arrival_time(&self) -> Time {
        self.arrival_time
    }

    /// The DAG template backing this request.
    #[must_use]
    pub fn dag(&self) -> &DagTemplate {
        &self.dag
    }

    /// The tool instance bound to a node.
    #[must_use]
    pub fn tool(&self, node: NodeId) -> &ToolInstance {
        &self.tools[node.index()]
    }

    /// Mutable access to the tool instance bound to a node.
    pub fn tool_mut(&mut self, node: NodeId) -> &mut ToolInstance {
        &mut self.tools[node.index()]
    }

    /// Iterate every (node, tool instance) pair.
    pub fn tools(&self) -> impl Iterator<Item = (NodeId, &ToolInstance)> {
        self.dag.nodes().zip(self.tools.iter())
    }

    /// Entry tools: nodes with no predecessors.
    #[must_use]
    pub fn root_nodes(&self) -> &[NodeId] {
        self.dag.roots()
    }

    /// True once every tool instance has reached `Completed`.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.tools.iter().all(|t| t.status() == ToolStatus::Completed)
    }

    /// `finish_time - arrival_time`, once the request has finished.
    #[must_use]
    pub fn latency(&self) -> Option<f64> {
        self.finish_time.map(|finish| finish - self.arrival_time)
    }

    /// When the request's first tool was admitted, if it has been.
    #[must_use]
    pub fn start_time(&self) -> Option<Time> {
        self.start_time
    }

    /// When the request's last tool finished, if it has.
    #[must_use]
    pub fn finish_time(&self) -> Option<Time> {
        self.finish_time
    }

    /// Record that the request was admitted at `now`. A no-op if already set
    /// (idempotent across repeated admission attempts for the same root).
    pub fn mark_started(&mut self, now: Time) {
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
    }

    /// Record that the request finished at `now`.
    pub fn mark_finished(&mut self, now: Time) {
        self.finish_time = Some(now);
    }

    /// Nodes that must complete before `node` may start.
    #[must_use]
    pub fn dependencies(&self, node: NodeId) -> &[NodeId] {
        self.dag.predecessors(node)
    }

    /// Nodes released when `node` completes.
    #[must_use]
    pub fn dependents(&self, node: NodeId) -> &[NodeId] {
        self.dag.successors(node)
    }

    /// True iff every predecessor of `node` has completed.
    #[must_use]
    pub fn can_start_tool(&self, node: NodeId) -> bool {
        self.dag
            .predecessors(node)
            .iter()
            .all(|&dep| self.tool(dep).status() == ToolStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::DagTemplateBuilder;
    use crate::tool::ToolTemplate;

    fn leaf(load: f64) -> ToolTemplate {
        ToolTemplate::from_named_loads(&[("cpu", load)]).unwrap()
    }

    #[test]
    fn new_request_starts_with_all_tools_pending() {
        let mut builder = DagTemplateBuilder::new();
        let a = builder.add_node("a", leaf(1.0));
        let b = builder.add_node("b", leaf(1.0));
        builder.add_edge(a, b);
        let dag = Arc::new(builder.build().unwrap());

        let request = Request::create("test", Time::ZERO, dag);
        assert!(!request.is_completed());
        assert_eq!(request.root_nodes(), &[a]);
        assert!(!request.can_start_tool(b));
    }
}
