//! Threadline Config
//!
//! This crate contains the serializable graph definition types for threadline.
//! These types represent a workflow graph as a caller submits it, before it is
//! assigned an identifier and stored.
//!
//! Definitions can be loaded from:
//! - JSON files (via the CLI, `threadline run graph.json`)
//! - Any other serde source (request bodies, fixtures)
//!
//! [`GraphDef::validate`] performs the creation-time checks. The engine never
//! re-checks a stored graph; dangling edge references are discovered lazily
//! when a run tries to execute them.

mod error;
mod graph;

pub use error::ConfigError;
pub use graph::GraphDef;
