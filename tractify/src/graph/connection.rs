//! Directed port-to-port connections.

use super::node::PATH_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A directed edge `(source, source_port) -> (dest, dest_port)` between
/// two sibling nodes of the same graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source node name.
    pub source: String,
    /// Output port on the source node (may be a nested path).
    pub source_port: String,
    /// Destination node name.
    pub dest: String,
    /// Input port on the destination node (may be a nested path).
    pub dest_port: String,
}

impl Connection {
    /// Creates a new connection.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        source_port: impl Into<String>,
        dest: impl Into<String>,
        dest_port: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_port: source_port.into(),
            dest: dest.into(),
            dest_port: dest_port.into(),
        }
    }

    /// Returns true if this connection feeds `dest.dest_port`.
    #[must_use]
    pub fn targets(&self, dest: &str, dest_port: &str) -> bool {
        self.dest == dest && self.dest_port == dest_port
    }

    /// Path of the leaf node that produces the value, relative to the graph.
    ///
    /// `tract_wf` / `outputnode.fod_file` resolves to `tract_wf.outputnode`.
    #[must_use]
    pub fn source_leaf(&self) -> String {
        leaf_path(&self.source, &self.source_port)
    }

    /// Path of the leaf node that consumes the value, relative to the graph.
    #[must_use]
    pub fn dest_leaf(&self) -> String {
        leaf_path(&self.dest, &self.dest_port)
    }
}

fn leaf_path(node: &str, port: &str) -> String {
    match port.rsplit_once(PATH_SEPARATOR) {
        Some((nested, _)) => format!("{node}{PATH_SEPARATOR}{nested}"),
        None => node.to_string(),
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source, self.source_port, self.dest, self.dest_port
        )
    }
}
