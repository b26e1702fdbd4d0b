//! In-memory graph and run storage.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use threadline_workflow::{Graph, State};

use crate::types::{NodeExecutionLogEntry, RunRecord, RunStatus};
use crate::{Error, GraphStore, RunStore};

/// Keyed in-memory store for graphs and runs.
///
/// Locks are held only for the duration of a single map operation, so
/// reading a run never waits on the step that is executing.
#[derive(Debug, Default)]
pub struct InMemoryStore {
  graphs: RwLock<HashMap<String, Graph>>,
  runs: RwLock<HashMap<String, RunRecord>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn update_run<F>(&self, run_id: &str, update: F) -> Result<(), Error>
  where
    F: FnOnce(&mut RunRecord),
  {
    let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
    let run = runs
      .get_mut(run_id)
      .ok_or_else(|| Error::run_not_found(run_id))?;
    if run.status.is_finished() {
      return Err(Error::RunFinished(run_id.to_string()));
    }
    update(run);
    Ok(())
  }
}

#[async_trait]
impl GraphStore for InMemoryStore {
  async fn put_graph(&self, graph: &Graph) -> Result<(), Error> {
    let mut graphs = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
    if graphs.contains_key(&graph.graph_id) {
      return Err(Error::AlreadyExists {
        kind: "graph",
        id: graph.graph_id.clone(),
      });
    }
    graphs.insert(graph.graph_id.clone(), graph.clone());
    Ok(())
  }

  async fn get_graph(&self, graph_id: &str) -> Result<Graph, Error> {
    self
      .graphs
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(graph_id)
      .cloned()
      .ok_or_else(|| Error::graph_not_found(graph_id))
  }

  async fn list_graphs(&self) -> Result<Vec<Graph>, Error> {
    let graphs = self.graphs.read().unwrap_or_else(PoisonError::into_inner);
    let mut list: Vec<Graph> = graphs.values().cloned().collect();
    list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.graph_id.cmp(&b.graph_id)));
    Ok(list)
  }
}

#[async_trait]
impl RunStore for InMemoryStore {
  async fn create_run(&self, run: &RunRecord) -> Result<(), Error> {
    let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
    if runs.contains_key(&run.run_id) {
      return Err(Error::AlreadyExists {
        kind: "run",
        id: run.run_id.clone(),
      });
    }
    runs.insert(run.run_id.clone(), run.clone());
    Ok(())
  }

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, Error> {
    self
      .runs
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(run_id)
      .cloned()
      .ok_or_else(|| Error::run_not_found(run_id))
  }

  async fn append_entry(&self, run_id: &str, entry: NodeExecutionLogEntry) -> Result<(), Error> {
    self.update_run(run_id, |run| run.log.push(entry))
  }

  async fn finish_run(
    &self,
    run_id: &str,
    status: RunStatus,
    final_state: State,
  ) -> Result<(), Error> {
    self.update_run(run_id, |run| {
      run.status = status;
      run.finished_at = Some(Utc::now());
      run.final_state = Some(final_state);
    })
  }

  async fn fail_run(&self, run_id: &str, error: String) -> Result<(), Error> {
    self.update_run(run_id, |run| {
      run.status = RunStatus::Failed;
      run.finished_at = Some(Utc::now());
      run.error = Some(error);
    })
  }

  async fn list_runs(&self, graph_id: &str) -> Result<Vec<RunRecord>, Error> {
    let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
    let mut list: Vec<RunRecord> = runs
      .values()
      .filter(|run| run.graph_id == graph_id)
      .cloned()
      .collect();
    list.sort_by_key(|run| run.started_at);
    Ok(list)
  }
}
