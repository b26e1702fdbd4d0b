use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid graph definition: {message}")]
  InvalidDefinition { message: String },

  #[error("failed to parse graph definition: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("failed to read graph definition {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
