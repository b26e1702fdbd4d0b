//! Workflow execution engine.
//!
//! The `Engine` walks a graph one node at a time. Each step applies a node to
//! the run's state, logs the step and picks the next node from the node's
//! directive or the graph's static edge.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use threadline_config::GraphDef;
use threadline_node::{NodeRegistry, RegistryError};
use threadline_store::{
  GraphStore, InMemoryStore, NodeExecutionLogEntry, RunMode, RunRecord, RunStatus, RunStore,
};
use threadline_workflow::{Graph, State};
use tracing::{Span, debug, error, info, instrument, warn};

use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, MAX_STEPS_EXCEEDED, NoopNotifier};
use crate::result::RunResult;

/// Upper bound on node executions per run, shared by both execution modes.
pub const MAX_STEPS: usize = 200;

/// The workflow execution engine.
///
/// Owns handles to the node registry and to the graph and run stores. All
/// three are shared, so one engine can serve concurrent runs.
#[derive(Clone)]
pub struct Engine {
  registry: Arc<NodeRegistry>,
  graphs: Arc<dyn GraphStore>,
  runs: Arc<dyn RunStore>,
}

/// How the step loop exited without an error.
struct Walk {
  status: RunStatus,
  state: State,
  log: Vec<NodeExecutionLogEntry>,
}

impl Engine {
  /// Create an engine over the given registry and stores.
  pub fn new(
    registry: Arc<NodeRegistry>,
    graphs: Arc<dyn GraphStore>,
    runs: Arc<dyn RunStore>,
  ) -> Self {
    Self {
      registry,
      graphs,
      runs,
    }
  }

  /// Create an engine backed by a fresh [`InMemoryStore`].
  pub fn in_memory(registry: NodeRegistry) -> Self {
    let store = Arc::new(InMemoryStore::new());
    Self::new(Arc::new(registry), store.clone(), store)
  }

  /// Validate a definition, assign it an ID and store it.
  pub async fn create_graph(&self, def: GraphDef) -> Result<String, EngineError> {
    let graph = Graph::lock(def)?;
    self.graphs.put_graph(&graph).await?;

    info!(
      graph_id = %graph.graph_id,
      graph_name = %graph.name,
      nodes = graph.nodes.len(),
      "graph_created"
    );
    Ok(graph.graph_id)
  }

  /// Get a stored graph.
  pub async fn get_graph(&self, graph_id: &str) -> Result<Graph, EngineError> {
    self.graphs.get_graph(graph_id).await.map_err(|e| match e {
      threadline_store::Error::NotFound { .. } => EngineError::GraphNotFound {
        graph_id: graph_id.to_string(),
      },
      other => other.into(),
    })
  }

  /// List stored graphs.
  pub async fn list_graphs(&self) -> Result<Vec<Graph>, EngineError> {
    Ok(self.graphs.list_graphs().await?)
  }

  /// Execute a graph to completion and return its result.
  ///
  /// The run record is published before the first step, so its progress is
  /// visible through [`Engine::get_run`] while this call is in flight.
  pub async fn run_graph(
    &self,
    graph_id: &str,
    initial_state: &State,
  ) -> Result<RunResult, EngineError> {
    self
      .execute(graph_id, initial_state, RunMode::Batch, &NoopNotifier)
      .await
  }

  /// Execute a graph, emitting an event per milestone through `sink`.
  ///
  /// The run is persisted exactly as a batch run would be. Hitting the step
  /// ceiling emits an `Error` event and returns `Ok` with a `Truncated`
  /// status; any other failure emits an `Error` event and returns `Err`.
  pub async fn run_graph_stream<N>(
    &self,
    graph_id: &str,
    initial_state: &State,
    sink: &N,
  ) -> Result<RunResult, EngineError>
  where
    N: ExecutionNotifier + ?Sized,
  {
    self
      .execute(graph_id, initial_state, RunMode::Stream, sink)
      .await
  }

  /// Get a snapshot of a run, finished or not.
  pub async fn get_run(&self, run_id: &str) -> Result<RunRecord, EngineError> {
    self.runs.get_run(run_id).await.map_err(|e| match e {
      threadline_store::Error::NotFound { .. } => EngineError::RunNotFound {
        run_id: run_id.to_string(),
      },
      other => other.into(),
    })
  }

  /// List runs of a graph, oldest first.
  pub async fn list_runs(&self, graph_id: &str) -> Result<Vec<RunRecord>, EngineError> {
    Ok(self.runs.list_runs(graph_id).await?)
  }

  /// Names of all registered nodes.
  pub fn list_nodes(&self) -> Vec<String> {
    self.registry.list()
  }

  /// Get a reference to the node registry.
  pub fn registry(&self) -> &NodeRegistry {
    &self.registry
  }

  #[instrument(
    name = "run_execute",
    skip_all,
    fields(graph_id = %graph_id, run_id = tracing::field::Empty, mode = ?mode)
  )]
  async fn execute<N>(
    &self,
    graph_id: &str,
    initial_state: &State,
    mode: RunMode,
    sink: &N,
  ) -> Result<RunResult, EngineError>
  where
    N: ExecutionNotifier + ?Sized,
  {
    let graph = self.get_graph(graph_id).await?;

    let run_id = uuid::Uuid::new_v4().to_string();
    Span::current().record("run_id", run_id.as_str());

    self
      .runs
      .create_run(&RunRecord::start(&run_id, &graph.graph_id, mode))
      .await?;

    info!(
      run_id = %run_id,
      graph_id = %graph.graph_id,
      entrypoint = %graph.entrypoint,
      "workflow_started"
    );
    sink.notify(ExecutionEvent::WorkflowStarted {
      run_id: run_id.clone(),
      graph_id: graph.graph_id.clone(),
      entrypoint: graph.entrypoint.clone(),
    });

    let outcome = match self.walk(&graph, &run_id, initial_state.clone(), sink).await {
      Ok(walk) => match self
        .runs
        .finish_run(&run_id, walk.status, walk.state.clone())
        .await
      {
        Ok(()) => Ok(walk),
        Err(e) => Err(EngineError::from(e)),
      },
      Err(e) => Err(e),
    };

    match outcome {
      Ok(walk) => {
        if walk.status == RunStatus::Truncated {
          warn!(run_id = %run_id, max_steps = MAX_STEPS, "workflow_truncated");
          sink.notify(ExecutionEvent::Error {
            run_id: run_id.clone(),
            message: MAX_STEPS_EXCEEDED.to_string(),
          });
        } else {
          info!(run_id = %run_id, steps = walk.log.len(), "workflow_completed");
          sink.notify(ExecutionEvent::WorkflowDone {
            run_id: run_id.clone(),
            final_state: walk.state.clone(),
          });
        }

        Ok(RunResult {
          run_id,
          status: walk.status,
          final_state: walk.state,
          log: walk.log,
        })
      }
      Err(e) => {
        error!(run_id = %run_id, error = %e, "workflow_failed");
        sink.notify(ExecutionEvent::Error {
          run_id: run_id.clone(),
          message: e.to_string(),
        });

        if let Err(store_err) = self.runs.fail_run(&run_id, e.to_string()).await {
          warn!(run_id = %run_id, error = %store_err, "failed to mark run as failed");
        }
        Err(e)
      }
    }
  }

  /// Run the step loop until there is no next node or the ceiling is hit.
  async fn walk<N>(
    &self,
    graph: &Graph,
    run_id: &str,
    mut state: State,
    sink: &N,
  ) -> Result<Walk, EngineError>
  where
    N: ExecutionNotifier + ?Sized,
  {
    let mut log = Vec::new();
    let mut current = Some(graph.entrypoint.clone());
    let mut steps = 0;

    loop {
      let Some(node_name) = current else {
        return Ok(Walk {
          status: RunStatus::Completed,
          state,
          log,
        });
      };

      if steps >= MAX_STEPS {
        return Ok(Walk {
          status: RunStatus::Truncated,
          state,
          log,
        });
      }

      if !graph.declares(&node_name) {
        return Err(EngineError::InvalidTransition {
          node: node_name,
          graph_id: graph.graph_id.clone(),
        });
      }

      let node = self.registry.get(&node_name).map_err(|e| match e {
        RegistryError::NotFound(node) | RegistryError::InvalidName(node) => {
          EngineError::NodeNotFound { node }
        }
      })?;

      sink.notify(ExecutionEvent::NodeStarted {
        run_id: run_id.to_string(),
        node: node_name.clone(),
      });

      let started = Instant::now();
      let output = node.apply(state).map_err(|source| EngineError::NodeFailed {
        node: node_name.clone(),
        source,
      })?;
      let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
      state = output.state;

      let entry = NodeExecutionLogEntry {
        node: node_name.clone(),
        timestamp: Utc::now(),
        state: state.clone(),
        duration_ms,
        directive: output.directive.clone(),
      };
      self.runs.append_entry(run_id, entry.clone()).await?;
      log.push(entry);

      debug!(
        run_id = %run_id,
        node = %node_name,
        step = steps,
        duration_ms,
        directive = ?output.directive,
        "node_completed"
      );
      sink.notify(ExecutionEvent::NodeCompleted {
        run_id: run_id.to_string(),
        node: node_name.clone(),
        duration_ms,
        state: state.clone(),
      });

      current = output
        .directive
        .resolve(graph.successor(&node_name))
        .map(str::to_string);
      steps += 1;
    }
  }
}
