use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use threadline_config::GraphDef;

use crate::error::WorkflowError;

/// A stored graph ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
  pub graph_id: String,
  pub name: String,
  /// Declared node names, in declaration order.
  pub nodes: Vec<String>,
  /// Static successor for each node: node -> next node.
  pub edges: HashMap<String, String>,
  pub entrypoint: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl Graph {
  /// Validate a definition and assign it a fresh identifier.
  pub fn lock(def: GraphDef) -> Result<Self, WorkflowError> {
    def.validate()?;
    Ok(Self::with_id(uuid::Uuid::new_v4().to_string(), def))
  }

  /// Build a graph from a definition without validating it.
  pub fn with_id(graph_id: impl Into<String>, def: GraphDef) -> Self {
    Self {
      graph_id: graph_id.into(),
      name: def.name,
      nodes: def.nodes,
      edges: def.edges,
      entrypoint: def.entrypoint,
      description: def.description,
    }
  }

  /// Whether `node` is part of the declared node set.
  pub fn declares(&self, node: &str) -> bool {
    self.nodes.iter().any(|n| n == node)
  }

  /// The static successor of `node`, if an edge is declared for it.
  pub fn successor(&self, node: &str) -> Option<&str> {
    self.edges.get(node).map(String::as_str)
  }
}
