//! Run results.

use serde::{Deserialize, Serialize};
use threadline_store::{NodeExecutionLogEntry, RunStatus};
use threadline_workflow::State;

/// Result of a finished run, returned to the caller that started it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
  pub run_id: String,
  /// `Completed`, or `Truncated` when the step ceiling stopped the walk.
  pub status: RunStatus,
  pub final_state: State,
  pub log: Vec<NodeExecutionLogEntry>,
}
