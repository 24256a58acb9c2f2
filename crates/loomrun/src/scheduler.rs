//! Concurrent DAG scheduling.
//!
//! The scheduler dispatches every ready node without waiting for siblings,
//! then blocks only on the next completion before recomputing readiness.
//! Data moves along edges as resolutions: a real value from a succeeded
//! source, or a skip. A node becomes ready once every incoming edge has
//! resolved, optional ports included, so no produced value is ever dropped
//! by an early dispatch. A node whose required inputs all resolved to skips
//! is skipped without running; skips originating from a fatal failure are
//! tracked separately so the terminal run status can tell an isolated
//! failure apart from one that blocked downstream work.

use crate::branch;
use crate::context::RunContext;
use crate::executor::NodeExecutor;
use crate::registry::{NodeRegistry, NodeTypeSpec};
use futures::stream::{FuturesUnordered, StreamExt};
use loomcore::{
    Edge, EngineError, Graph, GraphError, NodeError, NodeSpec, NodeStatus, RunReport, RunStatus,
    Value,
};
use petgraph::graph::DiGraph;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How one edge's data resolved.
#[derive(Debug, Clone, PartialEq)]
enum EdgeResolution {
    /// The source produced this value on the edge's handle.
    Value(Value),
    /// The edge is dead: source skipped, failed, or sat on a dead branch.
    Skipped { from_failure: bool },
}

/// Index structures derived from an immutable graph snapshot.
struct ExecutionPlan {
    index_of: HashMap<String, usize>,
    /// Per node, incoming edge indices in edge-declaration order.
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    fn build(graph: &Graph) -> Result<Self, EngineError> {
        let mut index_of = HashMap::new();
        for (i, node) in graph.nodes.iter().enumerate() {
            index_of.insert(node.id.clone(), i);
        }

        let mut dag: DiGraph<usize, usize> = DiGraph::new();
        let petgraph_ids: Vec<_> = (0..graph.nodes.len()).map(|i| dag.add_node(i)).collect();

        let mut incoming = vec![Vec::new(); graph.nodes.len()];
        let mut outgoing = vec![Vec::new(); graph.nodes.len()];
        for (ei, edge) in graph.edges.iter().enumerate() {
            let source = *index_of
                .get(&edge.source)
                .ok_or_else(|| GraphError::NodeNotFound(edge.source.clone()))?;
            let target = *index_of
                .get(&edge.target)
                .ok_or_else(|| GraphError::NodeNotFound(edge.target.clone()))?;
            dag.add_edge(petgraph_ids[source], petgraph_ids[target], ei);
            outgoing[source].push(ei);
            incoming[target].push(ei);
        }

        // The validator gates this earlier; re-checked here because the
        // scheduler must not trust callers to have validated.
        if petgraph::algo::is_cyclic_directed(&dag) {
            return Err(GraphError::CyclicDependency.into());
        }

        Ok(Self {
            index_of,
            incoming,
            outgoing,
        })
    }
}

type NodeTask = JoinHandle<(String, Result<HashMap<String, Value>, NodeError>)>;

pub struct Scheduler {
    max_parallel: usize,
    executor: NodeExecutor,
}

impl Scheduler {
    pub fn new(max_parallel: usize, executor: NodeExecutor) -> Self {
        Self {
            max_parallel,
            executor,
        }
    }

    /// Drive a validated graph to completion, mutating `ctx` as the single
    /// source of truth and returning the final snapshot.
    pub async fn run(
        &self,
        graph: Arc<Graph>,
        registry: Arc<NodeRegistry>,
        ctx: Arc<RunContext>,
        initial_inputs: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let plan = ExecutionPlan::build(&graph)?;
        let mut resolutions: Vec<Option<EdgeResolution>> = vec![None; graph.edges.len()];
        let mut attempts: HashMap<String, u32> = HashMap::new();
        let mut skipped_by_failure: HashSet<String> = HashSet::new();
        let mut fatal_failure = false;
        let mut in_flight: FuturesUnordered<NodeTask> = FuturesUnordered::new();

        loop {
            // Skip-cascade and dispatch until nothing more can move.
            loop {
                let mut progressed = false;
                for (idx, node) in graph.nodes.iter().enumerate() {
                    if ctx.node_status(&node.id) != Some(NodeStatus::Pending) {
                        continue;
                    }
                    // Every incoming edge must have resolved, optional ports
                    // included; required-ness only governs the skip rule below.
                    if !plan.incoming[idx].iter().all(|&ei| resolutions[ei].is_some()) {
                        continue;
                    }
                    let spec = registry.spec(&node.node_type);
                    let required: Vec<usize> = plan.incoming[idx]
                        .iter()
                        .copied()
                        .filter(|&ei| is_required(spec, &graph.edges[ei]))
                        .collect();

                    let all_skipped = !required.is_empty()
                        && required
                            .iter()
                            .all(|&ei| matches!(resolutions[ei], Some(EdgeResolution::Skipped { .. })));
                    if all_skipped {
                        let tainted = required.iter().any(|&ei| {
                            matches!(
                                resolutions[ei],
                                Some(EdgeResolution::Skipped { from_failure: true })
                            )
                        });
                        tracing::debug!(node = %node.id, "skipping node on dead branch");
                        ctx.record_skipped(&node.id)?;
                        if tainted {
                            skipped_by_failure.insert(node.id.clone());
                        }
                        for &ei in &plan.outgoing[idx] {
                            resolutions[ei] = Some(EdgeResolution::Skipped {
                                from_failure: tainted,
                            });
                        }
                        progressed = true;
                        continue;
                    }

                    if in_flight.len() >= self.max_parallel {
                        continue;
                    }

                    let inputs = assemble_inputs(
                        idx,
                        spec,
                        &plan,
                        &graph,
                        &resolutions,
                        &initial_inputs,
                    );
                    ctx.mark_ready(&node.id)?;
                    ctx.record_dispatch(&node.id, inputs.clone(), 0)?;
                    attempts.insert(node.id.clone(), 0);
                    in_flight.push(self.spawn_attempt(node, inputs, &registry, &cancel));
                    progressed = true;
                }
                if !progressed {
                    break;
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    for task in in_flight.iter() {
                        task.abort();
                    }
                    for node in &graph.nodes {
                        if ctx.node_status(&node.id) == Some(NodeStatus::Running) {
                            ctx.record_failure(&node.id, &NodeError::Cancelled)?;
                        }
                    }
                    tracing::info!(run_id = %ctx.run_id(), "run cancelled");
                    ctx.finish(RunStatus::Cancelled);
                    return Ok(ctx.snapshot());
                }
                joined = in_flight.next() => {
                    let Some(joined) = joined else { continue };
                    let (node_id, outcome) = joined
                        .map_err(|e| EngineError::Execution(format!("node task join error: {e}")))?;
                    let idx = *plan
                        .index_of
                        .get(&node_id)
                        .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
                    let node = &graph.nodes[idx];

                    let completion = outcome.and_then(|outputs| {
                        let spec = registry.spec(&node.node_type).ok_or_else(|| {
                            NodeError::UnknownNodeType(node.node_type.clone())
                        })?;
                        let live = branch::resolve_live_handles(spec, &node.config, &outputs)?;
                        Ok((outputs, live))
                    });

                    match completion {
                        Ok((outputs, live)) => {
                            for &ei in &plan.outgoing[idx] {
                                let edge = &graph.edges[ei];
                                resolutions[ei] = Some(if live.contains(&edge.source_handle) {
                                    EdgeResolution::Value(
                                        outputs.get(&edge.source_handle).cloned().unwrap_or(Value::Null),
                                    )
                                } else {
                                    EdgeResolution::Skipped { from_failure: false }
                                });
                            }
                            tracing::debug!(node = %node.id, "node succeeded");
                            ctx.record_success(&node.id, outputs)?;
                        }
                        Err(error) => {
                            self.handle_failure(
                                node,
                                idx,
                                error,
                                &plan,
                                &registry,
                                &ctx,
                                &cancel,
                                &mut attempts,
                                &mut resolutions,
                                &mut in_flight,
                                &mut fatal_failure,
                            )?;
                        }
                    }
                }
            }
        }

        let status = derive_run_status(&graph, &ctx, fatal_failure, &skipped_by_failure);
        tracing::info!(run_id = %ctx.run_id(), ?status, "run finished");
        ctx.finish(status);
        Ok(ctx.snapshot())
    }

    fn spawn_attempt(
        &self,
        node: &NodeSpec,
        inputs: HashMap<String, Value>,
        registry: &Arc<NodeRegistry>,
        cancel: &CancellationToken,
    ) -> NodeTask {
        let executor = self.executor.clone();
        let registry = Arc::clone(registry);
        let cancel = cancel.clone();
        let node = node.clone();
        tokio::spawn(async move {
            let node_id = node.id.clone();
            let result = executor.invoke(registry, node, inputs, cancel).await;
            (node_id, result)
        })
    }

    /// A failed attempt either re-enqueues (retry budget left) or settles the
    /// node as terminally failed and propagates skips downstream.
    #[allow(clippy::too_many_arguments)]
    fn handle_failure(
        &self,
        node: &NodeSpec,
        idx: usize,
        error: NodeError,
        plan: &ExecutionPlan,
        registry: &Arc<NodeRegistry>,
        ctx: &Arc<RunContext>,
        cancel: &CancellationToken,
        attempts: &mut HashMap<String, u32>,
        resolutions: &mut Vec<Option<EdgeResolution>>,
        in_flight: &mut FuturesUnordered<NodeTask>,
        fatal_failure: &mut bool,
    ) -> Result<(), EngineError> {
        ctx.record_failure(&node.id, &error)?;
        let attempt = attempts.get(&node.id).copied().unwrap_or(0);

        if attempt < node.max_retries {
            let next_attempt = attempt + 1;
            tracing::warn!(
                node = %node.id,
                %error,
                attempt = next_attempt,
                max_retries = node.max_retries,
                "retrying failed node"
            );
            let inputs = ctx.recorded_inputs(&node.id);
            ctx.record_dispatch(&node.id, inputs.clone(), next_attempt)?;
            attempts.insert(node.id.clone(), next_attempt);
            in_flight.push(self.spawn_attempt(node, inputs, registry, cancel));
            return Ok(());
        }

        let fatal = !node.continue_on_failure;
        if fatal {
            *fatal_failure = true;
        }
        tracing::error!(node = %node.id, %error, fatal, "node failed");
        for &ei in &plan.outgoing[idx] {
            resolutions[ei] = Some(EdgeResolution::Skipped { from_failure: fatal });
        }
        Ok(())
    }
}

fn is_required(spec: Option<&NodeTypeSpec>, edge: &Edge) -> bool {
    // Undeclared ports and unknown types are treated as required; validation
    // reports them, this is only a runtime fallback.
    spec.and_then(|s| s.input(&edge.target_handle))
        .map(|p| p.required)
        .unwrap_or(true)
}

/// Gather a node's inputs from resolved edges, grouped per input port in
/// edge-declaration order. Fan-in ports receive an array; skipped optional
/// contributions simply arrive absent.
fn assemble_inputs(
    idx: usize,
    spec: Option<&NodeTypeSpec>,
    plan: &ExecutionPlan,
    graph: &Graph,
    resolutions: &[Option<EdgeResolution>],
    initial_inputs: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let incoming = &plan.incoming[idx];
    if incoming.is_empty() {
        // Entry nodes are fed the run's initial inputs.
        return initial_inputs.clone();
    }

    let mut by_port: Vec<(&str, Vec<Value>)> = Vec::new();
    for &ei in incoming {
        let edge = &graph.edges[ei];
        if let Some(EdgeResolution::Value(value)) = &resolutions[ei] {
            match by_port.iter_mut().find(|(p, _)| *p == edge.target_handle) {
                Some((_, values)) => values.push(value.clone()),
                None => by_port.push((edge.target_handle.as_str(), vec![value.clone()])),
            }
        }
    }

    let mut inputs = HashMap::new();
    for (port, mut values) in by_port {
        let fan_in = spec
            .and_then(|s| s.input(port))
            .map(|p| p.fan_in)
            .unwrap_or(false);
        if fan_in {
            inputs.insert(port.to_string(), Value::Array(values));
        } else if !values.is_empty() {
            inputs.insert(port.to_string(), values.remove(0));
        }
    }
    inputs
}

fn derive_run_status(
    graph: &Graph,
    ctx: &RunContext,
    fatal_failure: bool,
    skipped_by_failure: &HashSet<String>,
) -> RunStatus {
    let mut any_failed = false;
    let mut any_succeeded = false;
    for node in &graph.nodes {
        match ctx.node_status(&node.id) {
            Some(NodeStatus::Failed) => any_failed = true,
            Some(NodeStatus::Succeeded) => any_succeeded = true,
            _ => {}
        }
    }

    if !any_failed {
        RunStatus::Succeeded
    } else if fatal_failure && (!skipped_by_failure.is_empty() || !any_succeeded) {
        // A fatal failure that blocked downstream work, or a run where
        // nothing else got through, fails the run outright.
        RunStatus::Failed
    } else {
        RunStatus::PartiallyFailed
    }
}
