use thiserror::Error;
use threadline_config::ConfigError;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error(transparent)]
  InvalidDefinition(#[from] ConfigError),
}
