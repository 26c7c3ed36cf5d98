//! Property-based invariant coverage for `SPEC_FULL.md` §8's quantified
//! invariants, driven with `proptest` over randomly shaped sequential
//! chains and loads (bounded small so shrinking stays fast).

use agentsim::dag::DagTemplateBuilder;
use agentsim::resource::ResourceTable;
use agentsim::time::Time;
use agentsim::tool::ToolTemplate;
use agentsim::Simulator;
use proptest::prelude::*;
use std::sync::Arc;

fn run_chain(loads: &[f64], capacity: f64) -> (Vec<f64>, f64) {
    let mut builder = DagTemplateBuilder::new();
    let mut nodes = Vec::new();
    for (i, &load) in loads.iter().enumerate() {
        let node = builder.add_node(format!("n{i}"), ToolTemplate::from_named_loads(&[("cpu", load)]).unwrap());
        if let Some(&previous) = nodes.last() {
            builder.add_edge(previous, node);
        }
        nodes.push(node);
    }
    let dag = Arc::new(builder.build().unwrap());

    let table = ResourceTable::uniform(capacity).unwrap();
    let mut sim = Simulator::new(table);
    let id = sim.submit("probe", Time::ZERO, dag);
    sim.run(Time::from_secs(10_000.0), 1_000_000).unwrap();

    let request = sim.request(id).unwrap();
    let finish_times: Vec<f64> =
        nodes.iter().map(|&n| request.tool(n).finish_time().unwrap().as_secs()).collect();
    (finish_times, request.latency().unwrap())
}

/// Builds a fan-out/fan-in DAG: one root, `branch_loads.len()` parallel
/// branches hanging off it (all contending for the same `cpu` capacity
/// simultaneously once the root completes), and a single join node
/// depending on every branch. Returns the simulator's resource-kind
/// utilisation peak plus, for the join, its start time and the latest
/// finish time among its predecessors.
fn run_diamond(root_load: f64, branch_loads: &[f64], join_load: f64, capacity: f64) -> ([f64; agentsim::resource::RESOURCE_KIND_COUNT], f64, f64) {
    let mut builder = DagTemplateBuilder::new();
    let root = builder.add_node("root", ToolTemplate::from_named_loads(&[("cpu", root_load)]).unwrap());
    let mut branches = Vec::new();
    for (i, &load) in branch_loads.iter().enumerate() {
        let node = builder.add_node(format!("branch{i}"), ToolTemplate::from_named_loads(&[("cpu", load)]).unwrap());
        builder.add_edge(root, node);
        branches.push(node);
    }
    let join = builder.add_node("join", ToolTemplate::from_named_loads(&[("cpu", join_load)]).unwrap());
    for &branch in &branches {
        builder.add_edge(branch, join);
    }
    let dag = Arc::new(builder.build().unwrap());

    let table = ResourceTable::uniform(capacity).unwrap();
    let mut sim = Simulator::new(table);
    let id = sim.submit("probe", Time::ZERO, dag);
    sim.run(Time::from_secs(10_000.0), 1_000_000).unwrap();

    let request = sim.request(id).unwrap();
    let join_start = request.tool(join).start_time().unwrap().as_secs();
    let latest_predecessor_finish = branches
        .iter()
        .map(|&b| request.tool(b).finish_time().unwrap().as_secs())
        .fold(f64::NEG_INFINITY, f64::max);

    (sim.metrics().peak_utilization(), join_start, latest_predecessor_finish)
}

proptest! {
    /// Multiple branches released simultaneously by the same root contend
    /// for the same `cpu` capacity; the engine's fair-share split must never
    /// let their combined consumption exceed capacity at any snapshot, and
    /// the join node must never start before the slowest branch finishes.
    #[test]
    fn fan_out_fan_in_respects_conservation_and_dependency_order(
        root_load in 1.0f64..100.0,
        branch_loads in prop::collection::vec(1.0f64..200.0, 2..5),
        join_load in 1.0f64..100.0,
        capacity in 10.0f64..500.0,
    ) {
        let (peak_utilization, join_start, latest_predecessor_finish) =
            run_diamond(root_load, &branch_loads, join_load, capacity);

        for &utilization in &peak_utilization {
            prop_assert!(utilization <= 1.0 + 1e-6);
        }
        prop_assert!(join_start >= latest_predecessor_finish - 1e-9);
    }

    /// A lone chain has no contention, so each tool's finish time is exactly
    /// the cumulative sum of `load / capacity`, and dependency ordering
    /// (`start_time` of a tool ≥ predecessors' finish) holds by construction
    /// of a single serial chain.
    #[test]
    fn sequential_chain_finish_times_match_analytic_sum(
        loads in prop::collection::vec(1.0f64..200.0, 1..6),
        capacity in 10.0f64..500.0,
    ) {
        let (finish_times, latency) = run_chain(&loads, capacity);

        let mut expected_cumulative = 0.0;
        for (i, &load) in loads.iter().enumerate() {
            expected_cumulative += load / capacity;
            prop_assert!((finish_times[i] - expected_cumulative).abs() < 1e-6);
        }

        let expected_latency = *finish_times.last().unwrap();
        prop_assert!((latency - expected_latency).abs() < 1e-9);
        prop_assert!(latency >= 0.0);

        for pair in finish_times.windows(2) {
            prop_assert!(pair[1] >= pair[0]);
        }
    }

    /// Determinism: identical inputs on two independently constructed
    /// simulators produce bit-identical completion timestamps.
    #[test]
    fn identical_inputs_are_bit_for_bit_deterministic(
        loads in prop::collection::vec(1.0f64..200.0, 1..6),
        capacity in 10.0f64..500.0,
    ) {
        let (first, first_latency) = run_chain(&loads, capacity);
        let (second, second_latency) = run_chain(&loads, capacity);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_latency.to_bits(), second_latency.to_bits());
    }

    /// Remaining work never goes negative and never exceeds the template
    /// load it started from, for every tool once the run reaches it.
    #[test]
    fn remaining_work_stays_within_template_bounds(
        loads in prop::collection::vec(1.0f64..200.0, 1..6),
        capacity in 10.0f64..500.0,
    ) {
        let mut builder = DagTemplateBuilder::new();
        let mut nodes = Vec::new();
        for (i, &load) in loads.iter().enumerate() {
            let node = builder.add_node(format!("n{i}"), ToolTemplate::from_named_loads(&[("cpu", load)]).unwrap());
            if let Some(&previous) = nodes.last() {
                builder.add_edge(previous, node);
            }
            nodes.push(node);
        }
        let dag = Arc::new(builder.build().unwrap());

        let table = ResourceTable::uniform(capacity).unwrap();
        let mut sim = Simulator::new(table);
        let id = sim.submit("probe", Time::ZERO, dag);
        sim.run(Time::from_secs(10_000.0), 1_000_000).unwrap();

        let request = sim.request(id).unwrap();
        for (i, &node) in nodes.iter().enumerate() {
            let tool = request.tool(node);
            prop_assert!(tool.remaining(agentsim::resource::ResourceKind::Cpu) <= loads[i]);
            prop_assert!(tool.remaining(agentsim::resource::ResourceKind::Cpu) >= 0.0);
            // Every chain link completes within the generous horizon above.
            prop_assert!(tool.finish_time().is_some());
        }
    }
}

#[test]
fn max_steps_zero_leaves_state_unchanged() {
    let mut builder = DagTemplateBuilder::new();
    builder.add_node("only", ToolTemplate::from_named_loads(&[("cpu", 100.0)]).unwrap());
    let dag = Arc::new(builder.build().unwrap());

    let table = ResourceTable::uniform(100.0).unwrap();
    let mut sim = Simulator::new(table);
    sim.submit("probe", Time::ZERO, dag);

    let before_steps = sim.total_steps();
    let before_now = sim.now();
    sim.run(Time::from_secs(10.0), 0).unwrap();
    assert_eq!(sim.total_steps(), before_steps);
    assert_eq!(sim.now(), before_now);
}

#[test]
fn rerunning_past_a_completed_horizon_is_a_no_op() {
    let mut builder = DagTemplateBuilder::new();
    builder.add_node("only", ToolTemplate::from_named_loads(&[("cpu", 100.0)]).unwrap());
    let dag = Arc::new(builder.build().unwrap());

    let table = ResourceTable::uniform(100.0).unwrap();
    let mut sim = Simulator::new(table);
    sim.submit("probe", Time::ZERO, dag);
    sim.run(Time::from_secs(10.0), 1_000).unwrap();

    let steps_after_first_run = sim.total_steps();
    let now_after_first_run = sim.now();
    sim.run(Time::from_secs(10.0), 1_000).unwrap();
    assert_eq!(sim.total_steps(), steps_after_first_run);
    assert_eq!(sim.now(), now_after_first_run);
}
