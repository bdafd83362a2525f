//! Serialisable views of an assembled graph.

use super::node::PATH_SEPARATOR;
use super::{Connection, Graph, Node, PortValue};
use crate::errors::TractifyError;
use crate::policy::ExecutionPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Topology of a graph: nodes, ports, bindings, policies and connections.
///
/// Two graphs with equal summaries are structurally identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Graph name.
    pub name: String,
    /// Working directory.
    pub base_dir: Option<PathBuf>,
    /// Graph-level policy.
    pub policy: Option<ExecutionPolicy>,
    /// Member nodes in insertion order.
    pub nodes: Vec<NodeSummary>,
    /// Connections in insertion order.
    pub connections: Vec<Connection>,
}

/// Summary of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Node name.
    pub name: String,
    /// Payload kind.
    pub kind: String,
    /// Declared inputs (empty for composites).
    pub inputs: Vec<String>,
    /// Declared outputs (empty for composites).
    pub outputs: Vec<String>,
    /// Static bindings.
    pub bindings: BTreeMap<String, PortValue>,
    /// Node policy.
    pub policy: Option<ExecutionPolicy>,
    /// Embedded graph, for composites.
    pub graph: Option<GraphSummary>,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        let (inputs, outputs) = node
            .ports()
            .map(|p| (p.inputs.clone(), p.outputs.clone()))
            .unwrap_or_default();
        Self {
            name: node.name().to_string(),
            kind: node.kind().to_string(),
            inputs,
            outputs,
            bindings: node.inputs().cloned().unwrap_or_default(),
            policy: node.policy().cloned(),
            graph: node.as_graph().map(Graph::summary),
        }
    }
}

/// One leaf node of a flattened graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatNode {
    /// Dotted path from the root graph.
    pub path: String,
    /// Payload kind.
    pub kind: String,
    /// Dotted paths of the leaf nodes feeding this one.
    pub upstream: Vec<String>,
    /// Crash directory from the node's policy.
    pub crashdump_dir: Option<PathBuf>,
}

impl Graph {
    /// Builds the topology summary.
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            name: self.name().to_string(),
            base_dir: self.base_dir().map(std::path::Path::to_path_buf),
            policy: self.policy().cloned(),
            nodes: self.nodes().iter().map(NodeSummary::from).collect(),
            connections: self.connections().to_vec(),
        }
    }

    /// Renders the topology summary as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the summary cannot be encoded.
    pub fn to_json_pretty(&self) -> Result<String, TractifyError> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }

    /// SHA-256 of the topology summary, hex encoded.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the summary cannot be encoded.
    pub fn fingerprint(&self) -> Result<String, TractifyError> {
        let bytes = serde_json::to_vec(&self.summary())?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Flattens nested graphs into leaf nodes in a valid execution order.
    ///
    /// Edges that cross composite boundaries are resolved to the leaf nodes
    /// they ultimately connect.
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatNode> {
        let mut out = Vec::new();
        let mut upstream: BTreeMap<String, Vec<String>> = BTreeMap::new();
        self.flatten_into("", &mut upstream, &mut out);
        for flat in &mut out {
            if let Some(preds) = upstream.remove(&flat.path) {
                flat.upstream = preds;
            }
        }
        out
    }

    fn flatten_into(
        &self,
        prefix: &str,
        upstream: &mut BTreeMap<String, Vec<String>>,
        out: &mut Vec<FlatNode>,
    ) {
        let qualify = |path: String| {
            if prefix.is_empty() {
                path
            } else {
                format!("{prefix}{PATH_SEPARATOR}{path}")
            }
        };

        for conn in self.connections() {
            let preds = upstream.entry(qualify(conn.dest_leaf())).or_default();
            let source = qualify(conn.source_leaf());
            if !preds.contains(&source) {
                preds.push(source);
            }
        }

        for name in self.execution_order() {
            let Some(node) = self.node(name) else {
                continue;
            };
            let path = qualify(name.to_string());
            match node.as_graph() {
                Some(inner) => inner.flatten_into(&path, upstream, out),
                None => out.push(FlatNode {
                    path,
                    kind: node.kind().to_string(),
                    upstream: Vec::new(),
                    crashdump_dir: node.policy().map(|p| p.crashdump_dir.clone()),
                }),
            }
        }
    }
}
