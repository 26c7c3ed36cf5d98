//! The pending-start event queue.
//!
//! Grounded on the teacher's `runtime::timer::TimerHeap`: a `BinaryHeap`
//! (a max-heap) turned into a min-heap by reversing `Ord`, plus a
//! monotonic counter to break exact timestamp ties deterministically in
//! insertion order — `TimerHeap` uses a `generation` counter for the same
//! reason.

use crate::dag::NodeId;
use crate::error::{Result, SimError};
use crate::request::RequestId;
use crate::time::Time;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Points at a specific tool instance: one node within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToolRef {
    /// The request owning the tool.
    pub request_id: RequestId,
    /// The DAG node the tool instance is bound to.
    pub node: NodeId,
}

/// A scheduled start: `tool` becomes ready to run at `time`.
#[derive(Debug, Clone, Copy)]
struct Event {
    time: Time,
    priority: i64,
    sequence: u64,
    tool: ToolRef,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for Event {}

/// Reversed so `BinaryHeap` (a max-heap) pops the earliest time first, then
/// lowest priority, then earliest insertion — the same trick
/// `runtime::timer::TimerEntry` uses for its deadline heap.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending tool-start events, ordered by (time, priority,
/// insertion order).
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Event>,
    next_sequence: u64,
}

impl EventQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `tool` to start at `time`, with default priority zero.
    pub fn push(&mut self, time: Time, tool: ToolRef) {
        self.push_with_priority(time, 0, tool);
    }

    /// Schedule `tool` to start at `time`, breaking same-time ties by
    /// ascending `priority` before insertion order.
    pub fn push_with_priority(&mut self, time: Time, priority: i64, tool: ToolRef) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Event { time, priority, sequence, tool });
    }

    /// Remove and return the earliest-scheduled event.
    pub fn pop(&mut self) -> Result<(Time, ToolRef)> {
        self.heap.pop().map(|e| (e.time, e.tool)).ok_or(SimError::EmptyQueue)
    }

    /// The time of the earliest-scheduled event, if any.
    #[must_use]
    pub fn peek_time(&self) -> Option<Time> {
        self.heap.peek().map(|e| e.time)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if there are no pending events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_node() -> NodeId {
        use crate::dag::DagTemplateBuilder;
        use crate::tool::ToolTemplate;
        let mut builder = DagTemplateBuilder::new();
        builder.add_node("n", ToolTemplate::idle())
    }

    fn tool_ref(_n: usize) -> ToolRef {
        ToolRef { request_id: RequestId::next(), node: some_node() }
    }

    #[test]
    fn pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.push(Time::from_secs(2.0), tool_ref(1));
        queue.push(Time::from_secs(1.0), tool_ref(2));
        queue.push(Time::from_secs(3.0), tool_ref(3));

        let (t1, _) = queue.pop().unwrap();
        let (t2, _) = queue.pop().unwrap();
        let (t3, _) = queue.pop().unwrap();
        assert_eq!(t1, Time::from_secs(1.0));
        assert_eq!(t2, Time::from_secs(2.0));
        assert_eq!(t3, Time::from_secs(3.0));
    }

    #[test]
    fn pop_on_empty_queue_errors() {
        let mut queue = EventQueue::new();
        assert!(matches!(queue.pop(), Err(SimError::EmptyQueue)));
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut queue = EventQueue::new();
        let first = tool_ref(1);
        let second = tool_ref(2);
        queue.push(Time::ZERO, first);
        queue.push(Time::ZERO, second);
        let (_, popped_first) = queue.pop().unwrap();
        assert_eq!(popped_first, first);
    }
}
