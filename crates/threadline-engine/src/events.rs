//! Execution events and notifiers for streaming runs.
//!
//! Events are emitted synchronously from the step loop, in step order. The
//! engine never waits for a consumer; what a notifier does with an event
//! (forward, buffer, drop) is up to the notifier.

use serde::{Deserialize, Serialize};
use threadline_workflow::State;
use tokio::sync::mpsc;

/// Message carried by the `Error` event when the step ceiling is hit.
pub const MAX_STEPS_EXCEEDED: &str = "max steps exceeded";

/// Events emitted during a streaming run.
///
/// Every stream starts with `WorkflowStarted` and ends with exactly one of
/// `WorkflowDone` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// The run has been published and is about to execute its entrypoint.
  WorkflowStarted {
    run_id: String,
    graph_id: String,
    entrypoint: String,
  },

  /// A node is about to execute.
  NodeStarted { run_id: String, node: String },

  /// A node has executed.
  NodeCompleted {
    run_id: String,
    node: String,
    duration_ms: f64,
    state: State,
  },

  /// The run stopped early: step ceiling or a failure.
  Error { run_id: String, message: String },

  /// The run completed normally.
  WorkflowDone { run_id: String, final_state: State },
}

impl ExecutionEvent {
  /// Whether this event closes the stream.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      ExecutionEvent::Error { .. } | ExecutionEvent::WorkflowDone { .. }
    )
  }
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event - implementations decide
/// what to do with them (forward to a transport, log, ignore, etc.).
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
///
/// Batch runs execute with this notifier.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this to hand events to an asynchronous consumer (a websocket, an SSE
/// response, a CLI printer).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls the step loop. Volume is at
  // most two events per step plus two, bounded by the step ceiling.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
