//! Engine errors.

use threadline_node::NodeError;
use threadline_workflow::WorkflowError;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  InvalidDefinition,
  InvalidTransition,
  NodeFailed,
  Store,
  Internal,
}

/// Errors that can occur while creating graphs or executing runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// No graph is stored under this ID.
  #[error("graph not found: {graph_id}")]
  GraphNotFound { graph_id: String },

  /// No run is stored under this ID.
  #[error("run not found: {run_id}")]
  RunNotFound { run_id: String },

  /// The registry has no node with this name.
  #[error("node '{node}' is not registered")]
  NodeNotFound { node: String },

  /// The definition was rejected at creation.
  #[error(transparent)]
  InvalidDefinition(#[from] WorkflowError),

  /// The walk reached a node that the graph does not declare.
  #[error("undefined node '{node}' in graph {graph_id}")]
  InvalidTransition { node: String, graph_id: String },

  /// A node returned an error.
  #[error("node '{node}' failed: {source}")]
  NodeFailed {
    node: String,
    #[source]
    source: NodeError,
  },

  /// The backing store failed.
  #[error("store error: {0}")]
  Store(#[from] threadline_store::Error),

  /// The task driving a streaming run panicked or was cancelled.
  #[error("run task join error: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::GraphNotFound { .. }
      | EngineError::RunNotFound { .. }
      | EngineError::NodeNotFound { .. } => ErrorKind::NotFound,
      EngineError::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
      EngineError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
      EngineError::NodeFailed { .. } => ErrorKind::NodeFailed,
      EngineError::Store(_) => ErrorKind::Store,
      EngineError::Join(_) => ErrorKind::Internal,
    }
  }
}
