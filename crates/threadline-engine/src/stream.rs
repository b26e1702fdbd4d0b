//! Channel-backed transport adapter for streaming runs.
//!
//! The engine emits events synchronously from its step loop. This adapter
//! drives a streaming run on its own tokio task and hands the caller the
//! receiving end of a channel, so any async consumer can forward events
//! without touching the engine.

use std::sync::Arc;

use threadline_workflow::State;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::{ChannelNotifier, ExecutionEvent};
use crate::result::RunResult;

/// A streaming run in progress.
///
/// # Usage
///
/// ```ignore
/// let mut stream = spawn_stream(engine, graph_id, state);
/// while let Some(event) = stream.events.recv().await {
///     println!("{}", serde_json::to_string(&event)?);
/// }
/// let result = stream.finish().await?;
/// ```
pub struct EventStream {
  /// Events in step order. Closes once the run has finished.
  pub events: mpsc::UnboundedReceiver<ExecutionEvent>,
  handle: JoinHandle<Result<RunResult, EngineError>>,
}

impl EventStream {
  /// Wait for the run to finish and return its result.
  ///
  /// Events that were not received yet are dropped.
  pub async fn finish(self) -> Result<RunResult, EngineError> {
    self.handle.await?
  }

  /// Drain all remaining events, then wait for the run's result.
  pub async fn collect(mut self) -> (Vec<ExecutionEvent>, Result<RunResult, EngineError>) {
    let mut events = Vec::new();
    while let Some(event) = self.events.recv().await {
      events.push(event);
    }
    let result = self.finish().await;
    (events, result)
  }
}

/// Start a streaming run on a new tokio task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_stream(engine: Arc<Engine>, graph_id: String, initial_state: State) -> EventStream {
  let (sender, events) = mpsc::unbounded_channel();

  let handle = tokio::spawn(async move {
    info!(graph_id = %graph_id, "starting streaming run");
    let notifier = ChannelNotifier::new(sender);
    engine
      .run_graph_stream(&graph_id, &initial_state, &notifier)
      .await
  });

  EventStream { events, handle }
}
