use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A workflow graph as submitted for creation.
///
/// Each node has at most one unconditional successor in `edges`. Edge
/// sources and targets are not required to appear in `nodes`.
///
/// ```json
/// {
///   "name": "summarize",
///   "nodes": ["split", "summarize", "merge", "refine"],
///   "edges": { "split": "summarize", "summarize": "merge", "merge": "refine" },
///   "entrypoint": "split"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
  pub name: String,
  pub nodes: Vec<String>,
  #[serde(default)]
  pub edges: HashMap<String, String>,
  pub entrypoint: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl GraphDef {
  /// Parse a definition from a JSON string.
  pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }

  /// Read and parse a definition from a JSON file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&content)
  }

  /// Check the definition before it is stored.
  ///
  /// Fails when the name is blank, a node is declared twice, or the
  /// entrypoint is not a declared node.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.name.trim().is_empty() {
      return Err(ConfigError::InvalidDefinition {
        message: "graph name must not be empty".to_string(),
      });
    }

    let mut seen = HashSet::with_capacity(self.nodes.len());
    for node in &self.nodes {
      if !seen.insert(node.as_str()) {
        return Err(ConfigError::InvalidDefinition {
          message: format!("node '{}' is declared more than once", node),
        });
      }
    }

    if !seen.contains(self.entrypoint.as_str()) {
      return Err(ConfigError::InvalidDefinition {
        message: format!(
          "entrypoint '{}' must be part of the nodes list",
          self.entrypoint
        ),
      });
    }

    Ok(())
  }
}
