//! Generic processing graph model.
//!
//! This module provides:
//! - Nodes with fixed port declarations and opaque payloads
//! - Graphs that embed as composite nodes, to any depth
//! - Assembly-time validation of connections
//! - Recursive traversal, policy propagation and topology summaries

mod connection;
mod node;
mod summary;
mod workflow;

pub use connection::Connection;
pub use node::{
    ExternalInterface, IdentityInterface, Interface, Node, PortSpec, PortValue, COMPOSITE_KIND,
    PATH_SEPARATOR,
};
pub use summary::{FlatNode, GraphSummary, NodeSummary};
pub use workflow::{Graph, INPUT_NODE, OUTPUT_NODE};
