use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use threadline_workflow::State;
use tracing::warn;

use crate::error::RegistryError;
use crate::node::{FnNode, Node};

/// Name-keyed lookup from node identifier to executable node.
///
/// Populated by the hosting application at startup and then shared with the
/// engine behind an `Arc`.
#[derive(Default, Clone)]
pub struct NodeRegistry {
  nodes: HashMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `node` under `name`.
  ///
  /// Registering a name twice replaces the earlier node, which is returned.
  pub fn register(
    &mut self,
    name: impl Into<String>,
    node: impl Node + 'static,
  ) -> Result<Option<Arc<dyn Node>>, RegistryError> {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(RegistryError::InvalidName(name));
    }

    let previous = self.nodes.insert(name.clone(), Arc::new(node));
    if previous.is_some() {
      warn!(node = %name, "replacing registered node");
    }
    Ok(previous)
  }

  /// Register a plain `state -> state` closure under `name`.
  pub fn register_fn<F>(
    &mut self,
    name: impl Into<String>,
    func: F,
  ) -> Result<Option<Arc<dyn Node>>, RegistryError>
  where
    F: Fn(State) -> State + Send + Sync + 'static,
  {
    self.register(name, FnNode::new(func))
  }

  /// Look up a node by name.
  pub fn get(&self, name: &str) -> Result<Arc<dyn Node>, RegistryError> {
    self
      .nodes
      .get(name)
      .cloned()
      .ok_or_else(|| RegistryError::NotFound(name.to_string()))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  /// Registered node names, sorted.
  pub fn list(&self) -> Vec<String> {
    let mut names: Vec<String> = self.nodes.keys().cloned().collect();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}

impl fmt::Debug for NodeRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NodeRegistry")
      .field("nodes", &self.list())
      .finish()
  }
}
