//! Threadline Engine
//!
//! This crate provides the workflow execution engine for threadline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │  - create_graph(def) → graph_id                             │
//! │  - run_graph(graph_id, state) → RunResult                   │
//! │  - run_graph_stream(graph_id, state, sink) → RunResult      │
//! │  - get_run(run_id) → RunRecord                              │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//!   NodeRegistry        GraphStore / RunStore   ExecutionNotifier
//!   (name → Node)       (threadline-store)      (events, streaming)
//! ```
//!
//! Both execution modes share one step loop and persist a run record. The
//! loop stops when a step has no next node or after [`MAX_STEPS`] steps.
//!
//! # Usage
//!
//! ```ignore
//! use threadline_engine::{Engine, ChannelNotifier};
//!
//! let engine = Engine::in_memory(registry);
//! let graph_id = engine.create_graph(def).await?;
//!
//! // Batch
//! let result = engine.run_graph(&graph_id, &state).await?;
//!
//! // Streaming, consumed from a channel
//! let events = threadline_engine::spawn_stream(Arc::new(engine), graph_id, state);
//! ```

mod engine;
mod error;
mod events;
mod result;
mod stream;

pub use engine::{Engine, MAX_STEPS};
pub use error::{EngineError, ErrorKind};
pub use events::{
  ChannelNotifier, ExecutionEvent, ExecutionNotifier, MAX_STEPS_EXCEEDED, NoopNotifier,
};
pub use result::RunResult;
pub use stream::{EventStream, spawn_stream};
