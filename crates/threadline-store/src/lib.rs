//! Threadline Store
//!
//! This crate provides the storage traits for graphs and runs, and an
//! in-memory implementation of both.
//!
//! The [`GraphStore`] trait defines operations for:
//! - Storing graphs once they have been assigned an identifier
//! - Looking graphs up by identifier
//!
//! The [`RunStore`] trait defines operations for:
//! - Publishing a run record before its first step
//! - Appending log entries as steps complete
//! - Closing a run as completed, truncated or failed
//!
//! Neither store supports updating a graph or deleting records. Any durable
//! backend satisfying these traits can replace [`InMemoryStore`].

mod memory;
mod types;

pub use memory::InMemoryStore;
pub use types::{NodeExecutionLogEntry, RunMode, RunRecord, RunStatus};

use async_trait::async_trait;
use threadline_workflow::{Graph, State};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: String },

  /// A record with this identifier already exists.
  #[error("{kind} already exists: {id}")]
  AlreadyExists { kind: &'static str, id: String },

  /// The run has already been closed and can no longer change.
  #[error("run already finished: {0}")]
  RunFinished(String),
}

impl Error {
  pub fn graph_not_found(id: impl Into<String>) -> Self {
    Error::NotFound {
      kind: "graph",
      id: id.into(),
    }
  }

  pub fn run_not_found(id: impl Into<String>) -> Self {
    Error::NotFound {
      kind: "run",
      id: id.into(),
    }
  }
}

/// Storage trait for graph definitions.
#[async_trait]
pub trait GraphStore: Send + Sync {
  /// Store a new graph.
  async fn put_graph(&self, graph: &Graph) -> Result<(), Error>;

  /// Get a graph by ID.
  async fn get_graph(&self, graph_id: &str) -> Result<Graph, Error>;

  /// List all stored graphs.
  async fn list_graphs(&self) -> Result<Vec<Graph>, Error>;
}

/// Storage trait for run records.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Publish a new run record.
  async fn create_run(&self, run: &RunRecord) -> Result<(), Error>;

  /// Get a snapshot of a run record by ID.
  ///
  /// A run that is still executing returns its partially filled log.
  async fn get_run(&self, run_id: &str) -> Result<RunRecord, Error>;

  /// Append a log entry to a running record.
  async fn append_entry(&self, run_id: &str, entry: NodeExecutionLogEntry) -> Result<(), Error>;

  /// Close a run that exited its step loop normally.
  async fn finish_run(&self, run_id: &str, status: RunStatus, final_state: State)
  -> Result<(), Error>;

  /// Close a run that was aborted by an error.
  async fn fail_run(&self, run_id: &str, error: String) -> Result<(), Error>;

  /// List runs for a graph, oldest first.
  async fn list_runs(&self, graph_id: &str) -> Result<Vec<RunRecord>, Error>;
}
