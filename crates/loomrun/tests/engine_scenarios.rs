//! End-to-end scheduling scenarios against an in-test node catalog.

use async_trait::async_trait;
use loomcore::{Graph, NodeError, NodeSpec, NodeStatus, RunStatus, Value};
use loomrun::{Branching, Engine, NodeBehavior, NodeRegistry, NodeTypeSpec, PortSpec};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Emits the configured `value` on its `out` port.
struct Emit;

#[async_trait]
impl NodeBehavior for Emit {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        _inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let value = config.get("value").cloned().unwrap_or(Value::Null);
        Ok(HashMap::from([("out".to_string(), value)]))
    }
}

/// Passes `in` to `out`, optionally sleeping `delay_ms` first and recording
/// its configured `tag` into a shared completion log.
struct Echo {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl NodeBehavior for Echo {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        if let Some(delay) = config.get("delay_ms").and_then(Value::as_f64) {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if let Some(tag) = config.get("tag").and_then(Value::as_str) {
            self.log.lock().unwrap().push(tag.to_string());
        }
        let value = inputs.get("in").cloned().unwrap_or(Value::Null);
        Ok(HashMap::from([("out".to_string(), value)]))
    }
}

/// Forwards its fan-in `items` collection.
struct Gather;

#[async_trait]
impl NodeBehavior for Gather {
    async fn run(
        &self,
        _config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let items = inputs.get("items").cloned().unwrap_or(Value::Array(vec![]));
        Ok(HashMap::from([("out".to_string(), items)]))
    }
}

/// Routes its input value to both branch handles; the resolver picks one.
struct IfElse;

#[async_trait]
impl NodeBehavior for IfElse {
    async fn run(
        &self,
        _config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let value = inputs
            .get("value")
            .cloned()
            .ok_or_else(|| NodeError::MissingInput("value".to_string()))?;
        Ok(HashMap::from([
            ("true".to_string(), value.clone()),
            ("false".to_string(), value),
        ]))
    }
}

/// Fails until its fuse runs out, then succeeds.
struct Flaky {
    remaining: AtomicU32,
}

#[async_trait]
impl NodeBehavior for Flaky {
    async fn run(
        &self,
        _config: &HashMap<String, Value>,
        _inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        if self.remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(NodeError::ExecutionFailed("transient".to_string()));
        }
        Ok(HashMap::from([("out".to_string(), Value::from("ok"))]))
    }
}

struct AlwaysFail;

#[async_trait]
impl NodeBehavior for AlwaysFail {
    async fn run(
        &self,
        _config: &HashMap<String, Value>,
        _inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

/// Never resolves; only a timeout or cancellation ends it.
struct Never;

#[async_trait]
impl NodeBehavior for Never {
    async fn run(
        &self,
        _config: &HashMap<String, Value>,
        _inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        std::future::pending().await
    }
}

fn registry(log: Arc<Mutex<Vec<String>>>, flaky_failures: u32) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(
        NodeTypeSpec::new("emit").with_output(PortSpec::required("out")),
        Arc::new(Emit),
    );
    registry.register(
        NodeTypeSpec::new("echo")
            .with_input(PortSpec::required("in"))
            .with_output(PortSpec::required("out")),
        Arc::new(Echo { log }),
    );
    registry.register(
        NodeTypeSpec::new("relay")
            .with_input(PortSpec::optional("in"))
            .with_output(PortSpec::required("out")),
        Arc::new(Echo {
            log: Arc::new(Mutex::new(Vec::new())),
        }),
    );
    registry.register(
        NodeTypeSpec::new("gather")
            .with_input(PortSpec::required("items").fan_in())
            .with_output(PortSpec::required("out")),
        Arc::new(Gather),
    );
    registry.register(
        NodeTypeSpec::new("if")
            .with_input(PortSpec::required("value"))
            .with_output(PortSpec::required("true"))
            .with_output(PortSpec::required("false"))
            .with_branching(Branching::Conditional),
        Arc::new(IfElse),
    );
    registry.register(
        NodeTypeSpec::new("flaky").with_output(PortSpec::required("out")),
        Arc::new(Flaky {
            remaining: AtomicU32::new(flaky_failures),
        }),
    );
    registry.register(
        NodeTypeSpec::new("fail")
            .with_input(PortSpec::optional("in"))
            .with_output(PortSpec::required("out")),
        Arc::new(AlwaysFail),
    );
    registry.register(
        NodeTypeSpec::new("never")
            .with_input(PortSpec::optional("in"))
            .with_output(PortSpec::required("out")),
        Arc::new(Never),
    );
    registry
}

fn engine() -> Engine {
    Engine::new(registry(Arc::new(Mutex::new(Vec::new())), 0))
}

#[tokio::test]
async fn linear_pipeline_propagates_values() {
    let engine = engine();
    let mut g = Graph::new("linear");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 1i64));
    g.add_node(NodeSpec::new("b", "echo"));
    g.add_node(NodeSpec::new("c", "echo"));
    g.connect("a", "b");
    g.connect("b", "c");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);
    for id in ["a", "b", "c"] {
        assert_eq!(report.node_status(id), Some(NodeStatus::Succeeded));
    }
    let b = report.node("b").unwrap();
    assert_eq!(b.inputs.get("in"), Some(&Value::Number(1.0)));
    let c = report.node("c").unwrap();
    assert_eq!(c.output.get("out"), Some(&Value::Number(1.0)));
}

#[tokio::test]
async fn topological_order_is_respected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::new(registry(Arc::clone(&log), 0));
    let mut g = Graph::new("chain");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", "v"));
    g.add_node(NodeSpec::new("b", "echo").with_config("tag", "b").with_config("delay_ms", 30i64));
    g.add_node(NodeSpec::new("c", "echo").with_config("tag", "c"));
    g.connect("a", "b");
    g.connect("b", "c");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(*log.lock().unwrap(), ["b", "c"]);
}

#[tokio::test]
async fn conditional_fork_skips_dead_branch() {
    let engine = engine();
    let mut g = Graph::new("fork");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", "x"));
    g.add_node(
        NodeSpec::new("if", "if")
            .with_config("operator", "equals")
            .with_config("compare_value", "x"),
    );
    g.add_node(NodeSpec::new("b", "echo"));
    g.add_node(NodeSpec::new("c", "echo"));
    g.connect_ports("a", "out", "if", "value");
    g.connect_ports("if", "true", "b", "in");
    g.connect_ports("if", "false", "c", "in");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.node_status("b"), Some(NodeStatus::Succeeded));
    assert_eq!(report.node_status("c"), Some(NodeStatus::Skipped));
    assert_eq!(
        report.node("b").unwrap().inputs.get("in"),
        Some(&Value::String("x".into()))
    );
    // The skipped branch never ran: no inputs, no output, no error.
    let c = report.node("c").unwrap();
    assert!(c.inputs.is_empty() && c.output.is_empty() && c.error.is_none());
}

#[tokio::test]
async fn unknown_operator_fails_the_conditional_node() {
    let engine = engine();
    let mut g = Graph::new("bad-op");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", "x"));
    g.add_node(NodeSpec::new("if", "if").with_config("operator", "resembles"));
    g.add_node(NodeSpec::new("b", "echo"));
    g.connect_ports("a", "out", "if", "value");
    g.connect_ports("if", "true", "b", "in");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.node_status("if"), Some(NodeStatus::Failed));
    let error = report.node("if").unwrap().error.clone().unwrap();
    assert!(error.contains("resembles"), "unexpected error: {error}");
    assert_eq!(report.node_status("b"), Some(NodeStatus::Skipped));
    assert_eq!(report.status, RunStatus::Failed);
}

#[tokio::test]
async fn value_edge_into_optional_port_is_delivered() {
    let engine = engine();
    let mut g = Graph::new("optional-edge");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 1i64));
    g.add_node(NodeSpec::new("r", "relay"));
    g.connect("a", "r");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);
    let r = report.node("r").unwrap();
    assert_eq!(r.inputs.get("in"), Some(&Value::Number(1.0)));
    assert_eq!(r.output.get("out"), Some(&Value::Number(1.0)));
}

#[tokio::test]
async fn skipped_optional_input_arrives_absent() {
    let engine = engine();
    let mut g = Graph::new("optional-skip");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", "x"));
    g.add_node(
        NodeSpec::new("if", "if")
            .with_config("operator", "equals")
            .with_config("compare_value", "x"),
    );
    g.add_node(NodeSpec::new("b", "echo"));
    g.add_node(NodeSpec::new("r", "relay"));
    g.connect_ports("a", "out", "if", "value");
    g.connect_ports("if", "true", "b", "in");
    g.connect_ports("if", "false", "r", "in");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);
    // The dead branch fed only an optional port, so the node still runs,
    // just without that input.
    let r = report.node("r").unwrap();
    assert_eq!(r.status, NodeStatus::Succeeded);
    assert!(r.inputs.is_empty());
    assert_eq!(r.output.get("out"), Some(&Value::Null));
}

#[tokio::test]
async fn fan_in_preserves_edge_order_despite_completion_order() {
    let engine = engine();
    let mut g = Graph::new("fan-in");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 1i64));
    g.add_node(NodeSpec::new("b", "emit").with_config("value", 2i64));
    // Slow the first branch down so the second finishes first.
    g.add_node(NodeSpec::new("slow", "echo").with_config("delay_ms", 50i64));
    g.add_node(NodeSpec::new("fast", "echo"));
    g.add_node(NodeSpec::new("join", "gather"));
    g.connect("a", "slow");
    g.connect("b", "fast");
    g.connect_ports("slow", "out", "join", "items");
    g.connect_ports("fast", "out", "join", "items");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);
    let join = report.node("join").unwrap();
    assert_eq!(
        join.inputs.get("items"),
        Some(&Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]))
    );
}

#[tokio::test]
async fn failure_is_isolated_to_dependents() {
    let engine = engine();
    let mut g = Graph::new("isolation");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 1i64));
    g.add_node(NodeSpec::new("b", "fail"));
    g.add_node(NodeSpec::new("c", "echo"));
    g.connect("a", "b");
    g.connect("a", "c");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.node_status("c"), Some(NodeStatus::Succeeded));
    assert_eq!(report.node_status("b"), Some(NodeStatus::Failed));
    assert!(report.node("b").unwrap().error.as_deref().unwrap().contains("boom"));
    assert_eq!(report.status, RunStatus::PartiallyFailed);
}

#[tokio::test]
async fn failure_blocking_downstream_fails_the_run() {
    let engine = engine();
    let mut g = Graph::new("blocked");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 1i64));
    g.add_node(NodeSpec::new("b", "fail"));
    g.add_node(NodeSpec::new("c", "echo"));
    g.connect("a", "b");
    g.connect_ports("b", "out", "c", "in");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.node_status("c"), Some(NodeStatus::Skipped));
    assert_eq!(report.status, RunStatus::Failed);
}

#[tokio::test]
async fn continue_on_failure_downgrades_to_partial() {
    let engine = engine();
    let mut g = Graph::new("non-fatal");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 1i64));
    g.add_node(NodeSpec::new("b", "fail").continue_on_failure());
    g.add_node(NodeSpec::new("c", "echo"));
    g.connect("a", "b");
    g.connect_ports("b", "out", "c", "in");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.node_status("b"), Some(NodeStatus::Failed));
    assert_eq!(report.node_status("c"), Some(NodeStatus::Skipped));
    assert_eq!(report.status, RunStatus::PartiallyFailed);
}

#[tokio::test]
async fn timeout_marks_node_failed_without_blocking_siblings() {
    let engine = engine();
    let mut g = Graph::new("timeout");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 1i64));
    g.add_node(NodeSpec::new("stuck", "never").with_timeout_ms(50));
    g.add_node(NodeSpec::new("c", "echo"));
    g.connect("a", "stuck");
    g.connect("a", "c");

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.node_status("stuck"), Some(NodeStatus::Failed));
    let error = report.node("stuck").unwrap().error.clone().unwrap();
    assert!(error.contains("timed out after 50ms"), "unexpected error: {error}");
    assert_eq!(report.node_status("c"), Some(NodeStatus::Succeeded));
    assert_eq!(report.status, RunStatus::PartiallyFailed);
}

#[tokio::test]
async fn retries_until_budget_then_succeeds() {
    let engine = Engine::new(registry(Arc::new(Mutex::new(Vec::new())), 2));
    let mut g = Graph::new("retry");
    g.add_node(NodeSpec::new("f", "flaky").with_max_retries(2));

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);
    let f = report.node("f").unwrap();
    assert_eq!(f.status, NodeStatus::Succeeded);
    assert_eq!(f.attempt, 2);
}

#[tokio::test]
async fn retries_exhausted_leaves_node_failed() {
    let engine = Engine::new(registry(Arc::new(Mutex::new(Vec::new())), 10));
    let mut g = Graph::new("retry-exhausted");
    g.add_node(NodeSpec::new("f", "flaky").with_max_retries(1));

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    let f = report.node("f").unwrap();
    assert_eq!(f.status, NodeStatus::Failed);
    assert_eq!(f.attempt, 1);
}

#[tokio::test]
async fn cyclic_graph_is_rejected_before_execution() {
    let engine = engine();
    let mut g = Graph::new("cycle");
    g.add_node(NodeSpec::new("a", "echo"));
    g.add_node(NodeSpec::new("b", "echo"));
    g.connect("a", "b");
    g.connect("b", "a");

    let err = engine.start(g, HashMap::new()).expect_err("must not start");
    match err {
        loomcore::EngineError::Validation(report) => {
            assert!(report
                .errors
                .iter()
                .any(|e| matches!(e, loomcore::ValidationError::Cycle { .. })));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[tokio::test]
async fn entry_nodes_receive_initial_inputs() {
    let engine = engine();
    let mut g = Graph::new("trigger");
    g.add_node(NodeSpec::new("a", "emit"));
    let initial = HashMap::from([("payload".to_string(), Value::from("hello"))]);

    let handle = engine.start(g, initial.clone()).unwrap();
    let report = handle.wait().await.unwrap();
    assert_eq!(report.node("a").unwrap().inputs, initial);
}

#[tokio::test]
async fn cancellation_terminates_the_run() {
    let engine = engine();
    let mut g = Graph::new("cancel");
    g.add_node(NodeSpec::new("stuck", "never").with_timeout_ms(60_000));

    let handle = engine.start(g, HashMap::new()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    let stuck = report.node("stuck").unwrap();
    assert_eq!(stuck.status, NodeStatus::Failed);
    assert!(stuck.error.as_deref().unwrap().contains("cancelled"));
}

#[tokio::test]
async fn status_feed_reports_node_lifecycle() {
    use loomcore::RunEvent;

    let engine = engine();
    let mut events = engine.subscribe();
    let mut g = Graph::new("feed");
    g.add_node(NodeSpec::new("a", "emit").with_config("value", 7i64));

    let report = engine.execute(g, HashMap::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Succeeded);

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            RunEvent::NodeStatusChanged { node_id, status, output, .. } => {
                assert_eq!(node_id, "a");
                if status == NodeStatus::Succeeded {
                    let output = output.unwrap();
                    assert_eq!(output.get("out"), Some(&Value::Number(7.0)));
                }
                statuses.push(status);
            }
            RunEvent::RunFinished { status, .. } => {
                assert_eq!(status, RunStatus::Succeeded);
            }
            RunEvent::RunStarted { .. } => {}
        }
    }
    assert_eq!(
        statuses,
        [NodeStatus::Ready, NodeStatus::Running, NodeStatus::Succeeded]
    );
}
