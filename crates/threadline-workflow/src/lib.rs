//! Threadline Workflow
//!
//! This crate provides the stored representation of a threadline graph.
//! A [`Graph`] is a validated [`GraphDef`](threadline_config::GraphDef) that
//! has been assigned an identifier. It is never mutated after creation.
//!
//! Key differences from `threadline-config`:
//! - The definition has passed creation-time validation
//! - The graph carries its assigned `graph_id`
//! - Successor lookup is exposed for the engine's walk
//!
//! It also defines [`State`], the mapping threaded through a run.

mod error;
mod graph;
mod state;

pub use error::WorkflowError;
pub use graph::Graph;
pub use state::State;
