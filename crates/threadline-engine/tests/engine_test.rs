//! Integration tests for batch runs.

use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use threadline_config::GraphDef;
use threadline_engine::{
  ChannelNotifier, Engine, EngineError, ErrorKind, ExecutionEvent, MAX_STEPS,
};
use threadline_node::{Directive, Node, NodeError, NodeOutput, NodeRegistry};
use threadline_nodes_text::{GenerateSummaries, MergeSummaries, RefineSummary, SplitText};
use threadline_store::{
  Error as StoreError, InMemoryStore, NodeExecutionLogEntry, RunMode, RunRecord, RunStatus,
  RunStore,
};
use threadline_workflow::State;
use tokio::sync::mpsc;

fn state(value: Value) -> State {
  value.as_object().cloned().unwrap()
}

fn graph_def(nodes: &[&str], edges: &[(&str, &str)], entrypoint: &str) -> GraphDef {
  GraphDef {
    name: "test".to_string(),
    nodes: nodes.iter().map(|n| n.to_string()).collect(),
    edges: edges
      .iter()
      .map(|(from, to)| (from.to_string(), to.to_string()))
      .collect::<HashMap<_, _>>(),
    entrypoint: entrypoint.to_string(),
    description: None,
  }
}

/// Appends its own name to the `trail` list.
fn tracer(name: &'static str) -> impl Fn(State) -> State + Send + Sync + 'static {
  move |mut s: State| {
    let mut trail = s
      .get("trail")
      .and_then(|v| v.as_array())
      .cloned()
      .unwrap_or_default();
    trail.push(json!(name));
    s.insert("trail".to_string(), Value::Array(trail));
    s
  }
}

fn tracing_registry(names: &[&'static str]) -> NodeRegistry {
  let mut registry = NodeRegistry::new();
  for name in names {
    registry.register_fn(*name, tracer(*name)).unwrap();
  }
  registry
}

struct Failing;

impl Node for Failing {
  fn apply(&self, _state: State) -> Result<NodeOutput, NodeError> {
    Err(NodeError::new("upstream service unavailable"))
  }
}

#[tokio::test]
async fn test_linear_graph_completes() {
  let engine = Engine::in_memory(tracing_registry(&["a", "b", "c"]));
  let graph_id = engine
    .create_graph(graph_def(&["a", "b", "c"], &[("a", "b"), ("b", "c")], "a"))
    .await
    .unwrap();

  let result = engine.run_graph(&graph_id, &State::new()).await.unwrap();

  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(result.final_state["trail"], json!(["a", "b", "c"]));
  let nodes: Vec<&str> = result.log.iter().map(|e| e.node.as_str()).collect();
  assert_eq!(nodes, vec!["a", "b", "c"]);
  assert!(result.log.len() < MAX_STEPS);

  let run = engine.get_run(&result.run_id).await.unwrap();
  assert_eq!(run.status, RunStatus::Completed);
  assert_eq!(run.mode, RunMode::Batch);
  assert!(run.finished_at.is_some());
  assert_eq!(run.final_state.as_ref(), Some(&result.final_state));
  assert_eq!(run.log, result.log);
}

#[tokio::test]
async fn test_log_snapshots_each_step() {
  let engine = Engine::in_memory(tracing_registry(&["a", "b"]));
  let graph_id = engine
    .create_graph(graph_def(&["a", "b"], &[("a", "b")], "a"))
    .await
    .unwrap();

  let result = engine.run_graph(&graph_id, &State::new()).await.unwrap();

  assert_eq!(result.log[0].state["trail"], json!(["a"]));
  assert_eq!(result.log[1].state["trail"], json!(["a", "b"]));
  assert!(result.log[0].timestamp <= result.log[1].timestamp);
  assert!(result.log.iter().all(|e| e.duration_ms >= 0.0));
}

#[tokio::test]
async fn test_cycle_is_truncated_at_step_ceiling() {
  let engine = Engine::in_memory(tracing_registry(&["ping", "pong"]));
  let graph_id = engine
    .create_graph(graph_def(
      &["ping", "pong"],
      &[("ping", "pong"), ("pong", "ping")],
      "ping",
    ))
    .await
    .unwrap();

  let result = engine.run_graph(&graph_id, &State::new()).await.unwrap();

  assert_eq!(result.log.len(), MAX_STEPS);
  assert_eq!(result.status, RunStatus::Truncated);

  let run = engine.get_run(&result.run_id).await.unwrap();
  assert_eq!(run.log.len(), 200);
  assert_eq!(run.status, RunStatus::Truncated);
  assert!(run.finished_at.is_some());
  assert!(run.final_state.is_some());
}

#[tokio::test]
async fn test_end_on_last_allowed_step_completes() {
  let mut registry = NodeRegistry::new();
  registry
    .register_fn("count", |mut s: State| {
      let n = s.get("n").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
      s.insert("n".to_string(), json!(n));
      if n == MAX_STEPS as u64 {
        s.insert("_next".to_string(), Value::Null);
      }
      s
    })
    .unwrap();
  let engine = Engine::in_memory(registry);
  let graph_id = engine
    .create_graph(graph_def(&["count"], &[("count", "count")], "count"))
    .await
    .unwrap();

  let result = engine.run_graph(&graph_id, &State::new()).await.unwrap();

  assert_eq!(result.log.len(), MAX_STEPS);
  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(result.final_state["n"], MAX_STEPS);
  assert_eq!(result.log.last().unwrap().directive, Directive::End);
}

#[tokio::test]
async fn test_self_loop_via_override_is_truncated() {
  let mut registry = NodeRegistry::new();
  registry
    .register_fn("spin", |mut s: State| {
      let n = s.get("n").and_then(|v| v.as_u64()).unwrap_or(0);
      s.insert("n".to_string(), json!(n + 1));
      s.insert("_next".to_string(), json!("spin"));
      s
    })
    .unwrap();
  let engine = Engine::in_memory(registry);
  let graph_id = engine
    .create_graph(graph_def(&["spin"], &[], "spin"))
    .await
    .unwrap();

  let result = engine.run_graph(&graph_id, &State::new()).await.unwrap();

  assert_eq!(result.status, RunStatus::Truncated);
  assert_eq!(result.final_state["n"], 200);
  assert!(!result.final_state.contains_key("_next"));
}

#[tokio::test]
async fn test_runs_are_isolated() {
  let engine = Engine::in_memory(tracing_registry(&["a", "b"]));
  let graph_id = engine
    .create_graph(graph_def(&["a", "b"], &[("a", "b")], "a"))
    .await
    .unwrap();

  let initial = state(json!({"text": "original"}));
  let mut first = engine.run_graph(&graph_id, &initial).await.unwrap();
  let second = engine.run_graph(&graph_id, &initial).await.unwrap();

  assert_ne!(first.run_id, second.run_id);
  assert_eq!(initial, state(json!({"text": "original"})));

  first
    .final_state
    .insert("text".to_string(), json!("changed"));
  assert_eq!(second.final_state["text"], "original");
  assert_eq!(initial["text"], "original");

  let stored = engine.get_run(&first.run_id).await.unwrap();
  assert_eq!(stored.final_state.unwrap()["text"], "original");
  assert_eq!(stored.log.last().unwrap().state["text"], "original");

  let stored = engine.get_run(&second.run_id).await.unwrap();
  assert_eq!(stored.final_state.unwrap()["text"], "original");
}

#[tokio::test]
async fn test_goto_overrides_static_edge() {
  let mut registry = tracing_registry(&["B", "C"]);
  registry
    .register_fn("A", |mut s: State| {
      s = tracer("A")(s);
      s.insert("_next".to_string(), json!("C"));
      s
    })
    .unwrap();
  let engine = Engine::in_memory(registry);
  let graph_id = engine
    .create_graph(graph_def(&["A", "B", "C"], &[("A", "B")], "A"))
    .await
    .unwrap();

  let result = engine.run_graph(&graph_id, &State::new()).await.unwrap();

  let nodes: Vec<&str> = result.log.iter().map(|e| e.node.as_str()).collect();
  assert_eq!(nodes, vec!["A", "C"]);
  assert_eq!(result.log[0].directive, Directive::Goto("C".to_string()));
}

#[tokio::test]
async fn test_end_overrides_static_edge() {
  let mut registry = tracing_registry(&["B"]);
  registry
    .register_fn("A", |mut s: State| {
      s.insert("_next".to_string(), Value::Null);
      s
    })
    .unwrap();
  let engine = Engine::in_memory(registry);
  let graph_id = engine
    .create_graph(graph_def(&["A", "B"], &[("A", "B")], "A"))
    .await
    .unwrap();

  let result = engine.run_graph(&graph_id, &State::new()).await.unwrap();

  assert_eq!(result.log.len(), 1);
  assert_eq!(result.log[0].directive, Directive::End);
  assert_eq!(result.status, RunStatus::Completed);
  assert!(!result.final_state.contains_key("trail"));
}

#[tokio::test]
async fn test_looping_refine_node() {
  let mut registry = NodeRegistry::new();
  registry
    .register("refine", RefineSummary::new("refine"))
    .unwrap();
  let engine = Engine::in_memory(registry);
  let graph_id = engine
    .create_graph(graph_def(&["refine"], &[], "refine"))
    .await
    .unwrap();

  let summary: Vec<String> = (0..20).map(|i| format!("word{}", i)).collect();
  let initial = state(json!({
    "summary": summary.join(" "),
    "max_summary_words": 5,
    "refine_step_words": 5
  }));

  let result = engine.run_graph(&graph_id, &initial).await.unwrap();

  assert!(result.log.len() > 1);
  assert!(result.log.iter().all(|e| e.node == "refine"));
  assert!(result.log.iter().any(|e| {
    let words = e.state["summary"].as_str().unwrap().split_whitespace().count();
    words <= 5 && e.directive == Directive::End
  }));
  assert_eq!(result.log.last().unwrap().directive, Directive::End);
  assert_eq!(result.final_state["summary_word_count"], 5);
}

#[tokio::test]
async fn test_unknown_graph_is_not_found() {
  let engine = Engine::in_memory(NodeRegistry::new());

  let err = engine
    .run_graph("no-such-graph", &State::new())
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(matches!(err, EngineError::GraphNotFound { ref graph_id } if graph_id == "no-such-graph"));
  assert!(err.to_string().contains("no-such-graph"));
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
  let engine = Engine::in_memory(NodeRegistry::new());

  let err = engine.get_run("no-such-run").await.unwrap_err();
  assert!(matches!(err, EngineError::RunNotFound { .. }));
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_invalid_definition_rejected_at_creation() {
  let engine = Engine::in_memory(NodeRegistry::new());

  let err = engine
    .create_graph(graph_def(&["a"], &[], "b"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidDefinition);
}

#[tokio::test]
async fn test_undeclared_edge_target_fails_lazily() {
  let engine = Engine::in_memory(tracing_registry(&["a", "ghost"]));
  let graph_id = engine
    .create_graph(graph_def(&["a"], &[("a", "ghost")], "a"))
    .await
    .unwrap();

  let err = engine.run_graph(&graph_id, &State::new()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidTransition);
  assert!(matches!(err, EngineError::InvalidTransition { ref node, .. } if node == "ghost"));

  // "a" ran before the failure was discovered.
  let runs = engine.list_runs(&graph_id).await.unwrap();
  assert_eq!(runs.len(), 1);
  assert_eq!(runs[0].log.len(), 1);
  assert_eq!(runs[0].log[0].node, "a");
  assert_eq!(runs[0].status, RunStatus::Failed);
  assert!(runs[0].finished_at.is_some());
  assert!(runs[0].final_state.is_none());
  assert!(runs[0].error.as_deref().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_goto_to_undeclared_node_fails_lazily() {
  let mut registry = tracing_registry(&["x"]);
  registry
    .register_fn("a", |mut s: State| {
      s = tracer("a")(s);
      s.insert("_next".to_string(), json!("x"));
      s
    })
    .unwrap();
  let engine = Engine::in_memory(registry);
  let graph_id = engine
    .create_graph(graph_def(&["a"], &[], "a"))
    .await
    .unwrap();

  let err = engine.run_graph(&graph_id, &State::new()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidTransition);
  assert!(matches!(err, EngineError::InvalidTransition { ref node, .. } if node == "x"));

  let runs = engine.list_runs(&graph_id).await.unwrap();
  assert_eq!(runs[0].status, RunStatus::Failed);
  assert_eq!(runs[0].log.len(), 1);
  assert_eq!(
    runs[0].log[0].directive,
    Directive::Goto("x".to_string())
  );
}

#[tokio::test]
async fn test_unregistered_node_is_not_found() {
  let engine = Engine::in_memory(tracing_registry(&["a"]));
  let graph_id = engine
    .create_graph(graph_def(&["a", "b"], &[("a", "b")], "a"))
    .await
    .unwrap();

  let err = engine.run_graph(&graph_id, &State::new()).await.unwrap_err();
  assert!(matches!(err, EngineError::NodeNotFound { ref node } if node == "b"));
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_failing_node_marks_run_failed() {
  let mut registry = NodeRegistry::new();
  registry.register("fail", Failing).unwrap();
  let engine = Engine::in_memory(registry);
  let graph_id = engine
    .create_graph(graph_def(&["fail"], &[], "fail"))
    .await
    .unwrap();

  let err = engine.run_graph(&graph_id, &State::new()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NodeFailed);

  let runs = engine.list_runs(&graph_id).await.unwrap();
  assert_eq!(runs[0].status, RunStatus::Failed);
  assert!(runs[0].log.is_empty());
}

#[tokio::test]
async fn test_end_to_end_summarization() {
  let mut registry = NodeRegistry::new();
  registry.register("split", SplitText).unwrap();
  registry.register("summarize", GenerateSummaries).unwrap();
  registry.register("merge", MergeSummaries).unwrap();
  registry.register("refine", RefineSummary::new("refine")).unwrap();
  let engine = Engine::in_memory(registry);

  let graph_id = engine
    .create_graph(graph_def(
      &["split", "summarize", "merge", "refine"],
      &[("split", "summarize"), ("summarize", "merge"), ("merge", "refine")],
      "split",
    ))
    .await
    .unwrap();

  let text: Vec<String> = (0..1000).map(|i| format!("token{}", i)).collect();
  let initial = state(json!({
    "text": text.join(" "),
    "chunk_size": 100,
    "per_chunk_summary_words": 20,
    "max_summary_words": 40
  }));

  let result = engine.run_graph(&graph_id, &initial).await.unwrap();

  assert!(result.log.len() >= 4);
  assert_eq!(result.log.last().unwrap().node, "refine");
  let words = result.final_state["summary"]
    .as_str()
    .unwrap()
    .split_whitespace()
    .count();
  assert!(words <= 40);
  assert_eq!(result.final_state["chunks"].as_array().unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_partial_run_visible_while_in_progress() {
  let entered = Arc::new(Barrier::new(2));
  let release = Arc::new(Barrier::new(2));

  let mut registry = tracing_registry(&["first"]);
  {
    let entered = entered.clone();
    let release = release.clone();
    registry
      .register_fn("gate", move |s: State| {
        entered.wait();
        release.wait();
        s
      })
      .unwrap();
  }
  let engine = Arc::new(Engine::in_memory(registry));
  let graph_id = engine
    .create_graph(graph_def(&["first", "gate"], &[("first", "gate")], "first"))
    .await
    .unwrap();

  let runner = {
    let engine = engine.clone();
    let graph_id = graph_id.clone();
    tokio::spawn(async move { engine.run_graph(&graph_id, &State::new()).await })
  };

  // Wait until the run is blocked inside "gate".
  let waiter = entered.clone();
  tokio::task::spawn_blocking(move || waiter.wait())
    .await
    .unwrap();

  let runs = engine.list_runs(&graph_id).await.unwrap();
  assert_eq!(runs.len(), 1);
  let partial = engine.get_run(&runs[0].run_id).await.unwrap();
  assert_eq!(partial.status, RunStatus::Running);
  assert_eq!(partial.log.len(), 1);
  assert!(partial.finished_at.is_none());

  let releaser = release.clone();
  tokio::task::spawn_blocking(move || releaser.wait())
    .await
    .unwrap();

  let result = tokio::time::timeout(Duration::from_secs(5), runner)
    .await
    .unwrap()
    .unwrap()
    .unwrap();
  assert_eq!(result.log.len(), 2);
  assert_eq!(
    engine.get_run(&result.run_id).await.unwrap().status,
    RunStatus::Completed
  );
}

#[tokio::test]
async fn test_list_nodes() {
  let engine = Engine::in_memory(tracing_registry(&["b", "a"]));
  assert_eq!(engine.list_nodes(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_list_graphs() {
  let engine = Engine::in_memory(tracing_registry(&["a"]));
  assert!(engine.list_graphs().await.unwrap().is_empty());

  let mut second = graph_def(&["a"], &[], "a");
  second.name = "second".to_string();
  let mut first = graph_def(&["a"], &[], "a");
  first.name = "first".to_string();
  let second_id = engine.create_graph(second).await.unwrap();
  let first_id = engine.create_graph(first).await.unwrap();

  let graphs = engine.list_graphs().await.unwrap();
  let ids: Vec<&str> = graphs.iter().map(|g| g.graph_id.as_str()).collect();
  assert_eq!(ids, vec![first_id.as_str(), second_id.as_str()]);
  assert_eq!(graphs[0].name, "first");
}

/// Delegates to an in-memory store but refuses to close runs normally.
struct UnclosableRuns(InMemoryStore);

#[async_trait]
impl RunStore for UnclosableRuns {
  async fn create_run(&self, run: &RunRecord) -> Result<(), StoreError> {
    self.0.create_run(run).await
  }

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, StoreError> {
    self.0.get_run(run_id).await
  }

  async fn append_entry(
    &self,
    run_id: &str,
    entry: NodeExecutionLogEntry,
  ) -> Result<(), StoreError> {
    self.0.append_entry(run_id, entry).await
  }

  async fn finish_run(
    &self,
    run_id: &str,
    _status: RunStatus,
    _final_state: State,
  ) -> Result<(), StoreError> {
    Err(StoreError::RunFinished(run_id.to_string()))
  }

  async fn fail_run(&self, run_id: &str, error: String) -> Result<(), StoreError> {
    self.0.fail_run(run_id, error).await
  }

  async fn list_runs(&self, graph_id: &str) -> Result<Vec<RunRecord>, StoreError> {
    self.0.list_runs(graph_id).await
  }
}

#[tokio::test]
async fn test_store_failure_on_finish_fails_run() {
  let engine = Engine::new(
    Arc::new(tracing_registry(&["a"])),
    Arc::new(InMemoryStore::new()),
    Arc::new(UnclosableRuns(InMemoryStore::new())),
  );
  let graph_id = engine
    .create_graph(graph_def(&["a"], &[], "a"))
    .await
    .unwrap();

  let (tx, mut rx) = mpsc::unbounded_channel();
  let err = engine
    .run_graph_stream(&graph_id, &State::new(), &ChannelNotifier::new(tx))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Store);

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
  assert!(matches!(events.last(), Some(ExecutionEvent::Error { .. })));

  let runs = engine.list_runs(&graph_id).await.unwrap();
  assert_eq!(runs[0].status, RunStatus::Failed);
  assert!(runs[0].error.is_some());
}
