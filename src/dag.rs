//! In-crate DAG builder and validator.
//!
//! The external tool-taxonomy/DAG-construction utility is out of scope
//! (`SPEC_FULL.md` §1), but the acyclicity/single-entry/reachability
//! invariant is not: `Request` construction must reject a malformed graph
//! no matter which layer assembled it, so the validator that enforces that
//! invariant lives here, reimplemented without a graph library (the
//! original used `networkx`; nodes here are few enough that plain
//! adjacency vectors are the idiomatic choice per `SPEC_FULL.md` §9).

use crate::error::{Result, SimError};
use crate::tool::ToolTemplate;
use std::collections::HashMap;

/// Index of a node within a [`DagTemplate`]'s internal node vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The raw index, stable for the lifetime of the owning `DagTemplate`.
    ///
    /// `Request` uses this to index its parallel `Vec<ToolInstance>`, which
    /// is built in `DagTemplate::nodes()` order.
    pub(crate) fn index(self) -> usize {
        self.0
    }

    /// Construct a `NodeId` from a raw index. Test-only: production code
    /// only ever obtains `NodeId`s from a `DagTemplate`.
    #[cfg(test)]
    pub(crate) fn from_raw(idx: usize) -> NodeId {
        NodeId(idx)
    }
}

/// A validated, immutable dependency graph of tool templates.
///
/// Shared via `Arc` across every [`crate::request::Request`] of a given
/// request type, since the template never changes after validation.
#[derive(Debug)]
pub struct DagTemplate {
    names: Vec<String>,
    templates: Vec<ToolTemplate>,
    predecessors: Vec<Vec<NodeId>>,
    successors: Vec<Vec<NodeId>>,
    roots: Vec<NodeId>,
}

impl DagTemplate {
    /// The number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up a node by name.
    #[must_use]
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.iter().position(|n| n == name).map(NodeId)
    }

    /// The display name of a node.
    #[must_use]
    pub fn name(&self, node: NodeId) -> &str {
        &self.names[node.0]
    }

    /// The tool template bound to a node.
    #[must_use]
    pub fn template(&self, node: NodeId) -> ToolTemplate {
        self.templates[node.0]
    }

    /// All nodes with no predecessors (entry points).
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// The nodes that must complete before `node` may start.
    #[must_use]
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        &self.predecessors[node.0]
    }

    /// The nodes released when `node` completes.
    #[must_use]
    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        &self.successors[node.0]
    }

    /// Iterate every node id in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.names.len()).map(NodeId)
    }
}

#[cfg(test)]
impl DagTemplate {
    /// Construct a `DagTemplate` directly from its parts, bypassing
    /// [`DagTemplateBuilder::build`]'s single-entry validation.
    ///
    /// Exists only so crate-internal tests can exercise the "multiple
    /// entry nodes" Open Question resolution from `DESIGN.md`: the public
    /// builder rejects multi-root graphs (matching the out-of-scope
    /// validator's contract), but `Request`/`Simulator` admission code
    /// must still behave correctly if handed one, e.g. from a future
    /// relaxed builder.
    pub(crate) fn from_parts_for_test(
        names: Vec<String>,
        templates: Vec<ToolTemplate>,
        predecessors: Vec<Vec<NodeId>>,
        successors: Vec<Vec<NodeId>>,
        roots: Vec<NodeId>,
    ) -> Self {
        DagTemplate { names, templates, predecessors, successors, roots }
    }
}

/// Accumulates named nodes and edges, then validates into a [`DagTemplate`].
#[derive(Debug, Default)]
pub struct DagTemplateBuilder {
    names: Vec<String>,
    templates: Vec<ToolTemplate>,
    index_of: HashMap<String, usize>,
    edges: Vec<(usize, usize)>,
}

impl DagTemplateBuilder {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node bound to a tool template. Returns its `NodeId`.
    ///
    /// Re-adding the same name replaces its template and keeps its id.
    pub fn add_node(&mut self, name: impl Into<String>, template: ToolTemplate) -> NodeId {
        let name = name.into();
        if let Some(&idx) = self.index_of.get(&name) {
            self.templates[idx] = template;
            return NodeId(idx);
        }
        let idx = self.names.len();
        self.index_of.insert(name.clone(), idx);
        self.names.push(name);
        self.templates.push(template);
        NodeId(idx)
    }

    /// Add a directed edge `from -> to` (`to` depends on `from`).
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.edges.push((from.0, to.0));
    }

    /// Validate the accumulated nodes and edges into an immutable
    /// [`DagTemplate`].
    ///
    /// Rejects cycles, zero or multiple entry nodes, and nodes unreachable
    /// from the entry, each with `MalformedGraph`.
    pub fn build(self) -> Result<DagTemplate> {
        let n = self.names.len();
        let mut successors = vec![Vec::new(); n];
        let mut predecessors = vec![Vec::new(); n];
        for &(from, to) in &self.edges {
            successors[from].push(NodeId(to));
            predecessors[to].push(NodeId(from));
        }

        let roots: Vec<NodeId> = (0..n)
            .filter(|&i| predecessors[i].is_empty())
            .map(NodeId)
            .collect();

        if n == 0 {
            return Err(SimError::MalformedGraph { reason: "graph has no nodes".into() });
        }
        if roots.is_empty() {
            return Err(SimError::MalformedGraph {
                reason: "no entry node: every node has a predecessor (cycle?)".into(),
            });
        }
        if roots.len() > 1 {
            return Err(SimError::MalformedGraph {
                reason: format!(
                    "graph has {} entry nodes, expected exactly one: {:?}",
                    roots.len(),
                    roots.iter().map(|r| self.names[r.0].clone()).collect::<Vec<_>>()
                ),
            });
        }

        detect_cycle(&successors)?;

        let reachable = reachable_from(roots[0], &successors);
        if reachable.iter().filter(|&&r| r).count() != n {
            let unreachable: Vec<&str> = (0..n)
                .filter(|&i| !reachable[i])
                .map(|i| self.names[i].as_str())
                .collect();
            return Err(SimError::MalformedGraph {
                reason: format!("unreachable nodes from entry: {unreachable:?}"),
            });
        }

        Ok(DagTemplate {
            names: self.names,
            templates: self.templates,
            predecessors,
            successors,
            roots,
        })
    }
}

/// DFS-based cycle detection with the classic white/gray/black colouring.
fn detect_cycle(successors: &[Vec<NodeId>]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let n = successors.len();
    let mut color = vec![Color::White; n];

    fn visit(
        node: usize,
        successors: &[Vec<NodeId>],
        color: &mut [Color],
    ) -> Result<()> {
        color[node] = Color::Gray;
        for &next in &successors[node] {
            match color[next.0] {
                Color::White => visit(next.0, successors, color)?,
                Color::Gray => {
                    return Err(SimError::MalformedGraph {
                        reason: format!("cycle detected through node index {}", next.0),
                    })
                }
                Color::Black => {}
            }
        }
        color[node] = Color::Black;
        Ok(())
    }

    for start in 0..n {
        if color[start] == Color::White {
            visit(start, successors, &mut color)?;
        }
    }
    Ok(())
}

/// BFS reachability set from a single entry node.
fn reachable_from(entry: NodeId, successors: &[Vec<NodeId>]) -> Vec<bool> {
    let mut seen = vec![false; successors.len()];
    let mut queue = std::collections::VecDeque::new();
    seen[entry.0] = true;
    queue.push_back(entry);
    while let Some(node) = queue.pop_front() {
        for &next in &successors[node.0] {
            if !seen[next.0] {
                seen[next.0] = true;
                queue.push_back(next);
            }
        }
    }
    seen
}
