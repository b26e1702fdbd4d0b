use serde::{Deserialize, Serialize};
use serde_json::Value;
use threadline_workflow::State;

use crate::error::NodeError;

/// Reserved state key read by [`NodeOutput::from_state`].
pub const NEXT_KEY: &str = "_next";

/// Control-flow decision returned by a node alongside its state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "node", rename_all = "snake_case")]
pub enum Directive {
  /// Follow the graph's static edge.
  #[default]
  Continue,
  /// Run this node next, regardless of the static edge.
  Goto(String),
  /// Stop the run after this step, regardless of the static edge.
  End,
}

impl Directive {
  /// Resolve the node to run after `static_next`.
  pub fn resolve<'a>(&'a self, static_next: Option<&'a str>) -> Option<&'a str> {
    match self {
      Directive::Continue => static_next,
      Directive::Goto(node) => Some(node.as_str()),
      Directive::End => None,
    }
  }
}

/// What a node hands back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
  pub state: State,
  pub directive: Directive,
}

impl NodeOutput {
  /// Follow the static edge.
  pub fn next(state: State) -> Self {
    Self {
      state,
      directive: Directive::Continue,
    }
  }

  /// Jump to `node` next.
  pub fn goto(state: State, node: impl Into<String>) -> Self {
    Self {
      state,
      directive: Directive::Goto(node.into()),
    }
  }

  /// Terminate the run after this step.
  pub fn end(state: State) -> Self {
    Self {
      state,
      directive: Directive::End,
    }
  }

  /// Split the reserved [`NEXT_KEY`] out of a plain state mapping.
  ///
  /// A string selects the next node, `null` ends the run, and an absent key
  /// follows the static edge. The key never remains in the returned state.
  pub fn from_state(mut state: State) -> Result<Self, NodeError> {
    let directive = match state.remove(NEXT_KEY) {
      None => Directive::Continue,
      Some(Value::Null) => Directive::End,
      Some(Value::String(node)) => Directive::Goto(node),
      Some(other) => {
        return Err(NodeError::new(format!(
          "'{}' must be a node name or null, got {}",
          NEXT_KEY, other
        )));
      }
    };
    Ok(Self { state, directive })
  }
}

/// A named unit that transforms the shared state.
///
/// Implementations must run to completion without suspending. They receive
/// the run's state by value and return the state for the next step.
pub trait Node: Send + Sync {
  fn apply(&self, state: State) -> Result<NodeOutput, NodeError>;
}

/// Adapts a plain `state -> state` closure into a [`Node`].
///
/// The closure steers control flow through the reserved [`NEXT_KEY`].
pub struct FnNode<F> {
  func: F,
}

impl<F> FnNode<F>
where
  F: Fn(State) -> State + Send + Sync,
{
  pub fn new(func: F) -> Self {
    Self { func }
  }
}

impl<F> Node for FnNode<F>
where
  F: Fn(State) -> State + Send + Sync,
{
  fn apply(&self, state: State) -> Result<NodeOutput, NodeError> {
    NodeOutput::from_state((self.func)(state))
  }
}
