use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use threadline_node::Directive;
use threadline_workflow::State;

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Running,
  /// The walk reached a step with no next node.
  Completed,
  /// The walk hit the step ceiling with a next node still pending.
  Truncated,
  Failed,
}

impl RunStatus {
  pub fn is_finished(self) -> bool {
    !matches!(self, RunStatus::Running)
  }
}

/// How the run was driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
  Batch,
  Stream,
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionLogEntry {
  pub node: String,
  pub timestamp: DateTime<Utc>,
  /// Full copy of the state after the step.
  pub state: State,
  pub duration_ms: f64,
  /// Control-flow decision the node returned.
  pub directive: Directive,
}

/// A run as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub run_id: String,
  pub graph_id: String,
  pub mode: RunMode,
  pub status: RunStatus,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  pub final_state: Option<State>,
  pub error: Option<String>,
  pub log: Vec<NodeExecutionLogEntry>,
}

impl RunRecord {
  /// A freshly started run with an empty log.
  pub fn start(run_id: impl Into<String>, graph_id: impl Into<String>, mode: RunMode) -> Self {
    Self {
      run_id: run_id.into(),
      graph_id: graph_id.into(),
      mode,
      status: RunStatus::Running,
      started_at: Utc::now(),
      finished_at: None,
      final_state: None,
      error: None,
      log: Vec::new(),
    }
  }
}
