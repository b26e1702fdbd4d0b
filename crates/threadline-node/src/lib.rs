//! Threadline Node
//!
//! Nodes are the units of work a graph is made of. Each node implements the
//! [`Node`] trait and is registered under a name in a [`NodeRegistry`]; graph
//! node names are resolved against that registry when a run reaches them.

mod error;
mod node;
mod registry;

pub use error::{NodeError, RegistryError};
pub use node::{Directive, FnNode, NEXT_KEY, Node, NodeOutput};
pub use registry::NodeRegistry;
