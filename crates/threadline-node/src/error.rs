use thiserror::Error;

/// Failure raised by a node while transforming state.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct NodeError {
  pub message: String,
}

impl NodeError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("node not registered: {0}")]
  NotFound(String),

  #[error("invalid node name: {0:?}")]
  InvalidName(String),
}
