//! Nodes, their opaque payloads and declared ports.

use super::Graph;
use crate::errors::{PortMismatchError, TractifyError};
use crate::policy::ExecutionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::sync::Arc;

/// Separator between path segments of nested nodes and ports.
pub const PATH_SEPARATOR: char = '.';

/// Kind reported by composite nodes.
pub const COMPOSITE_KIND: &str = "workflow";

/// Opaque payload of a leaf node.
///
/// The payload belongs to an external collaborator; assembly only needs
/// its kind and its fixed port declaration.
pub trait Interface: Send + Sync + Debug {
    /// Returns a stable identifier for the kind of work.
    fn kind(&self) -> &str;

    /// Returns the declared ports. Must be the same on every call.
    fn ports(&self) -> PortSpec;
}

/// Declared input and output port names of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Input port names, in declaration order.
    pub inputs: Vec<String>,
    /// Output port names, in declaration order.
    pub outputs: Vec<String>,
}

impl PortSpec {
    /// Creates a port declaration.
    #[must_use]
    pub fn new<I, O>(inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `port` is a declared input.
    #[must_use]
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p == port)
    }

    /// Returns true if `port` is a declared output.
    #[must_use]
    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p == port)
    }
}

/// Pass-through payload whose outputs mirror its inputs.
///
/// Used for the `inputnode` / `outputnode` boundary of every stage graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityInterface {
    fields: Vec<String>,
}

impl IdentityInterface {
    /// Creates an identity payload over the given fields.
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Interface for IdentityInterface {
    fn kind(&self) -> &str {
        "identity"
    }

    fn ports(&self) -> PortSpec {
        PortSpec::new(self.fields.clone(), self.fields.clone())
    }
}

/// Payload implemented outside this crate, known only by kind and ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInterface {
    kind: String,
    ports: PortSpec,
}

impl ExternalInterface {
    /// Creates an external payload.
    #[must_use]
    pub fn new(kind: impl Into<String>, ports: PortSpec) -> Self {
        Self {
            kind: kind.into(),
            ports,
        }
    }
}

impl Interface for ExternalInterface {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn ports(&self) -> PortSpec {
        self.ports.clone()
    }
}

/// A value bound to a node input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PortValue {
    /// Free text (identifiers).
    Text(String),
    /// A file or directory path.
    Path(PathBuf),
    /// An integer parameter.
    Integer(u64),
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for PortValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for PortValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<PathBuf> for PortValue {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&std::path::Path> for PortValue {
    fn from(value: &std::path::Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<u64> for PortValue {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

#[derive(Debug, Clone)]
struct LeafNode {
    interface: Arc<dyn Interface>,
    ports: PortSpec,
    inputs: BTreeMap<String, PortValue>,
    policy: Option<ExecutionPolicy>,
}

#[derive(Debug, Clone)]
enum NodeBody {
    Leaf(LeafNode),
    Composite(Box<Graph>),
}

/// An addressable unit of work inside a [`Graph`].
///
/// A node is either a leaf wrapping an opaque [`Interface`] or a composite
/// embedding a whole graph. Ports of a composite are addressed by path,
/// e.g. `outputnode.fod_file`.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    body: NodeBody,
}

impl Node {
    /// Creates a leaf node. Ports are read from the payload once.
    #[must_use]
    pub fn leaf(name: impl Into<String>, interface: Arc<dyn Interface>) -> Self {
        let ports = interface.ports();
        Self {
            name: name.into(),
            body: NodeBody::Leaf(LeafNode {
                interface,
                ports,
                inputs: BTreeMap::new(),
                policy: None,
            }),
        }
    }

    /// Creates an identity leaf node over the given fields.
    #[must_use]
    pub fn identity(name: impl Into<String>, fields: &[&str]) -> Self {
        Self::leaf(name, Arc::new(IdentityInterface::new(fields.iter().copied())))
    }

    /// Wraps a graph as a composite node named after the graph.
    #[must_use]
    pub fn composite(graph: Graph) -> Self {
        Self {
            name: graph.name().to_string(),
            body: NodeBody::Composite(Box::new(graph)),
        }
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the payload kind, or `"workflow"` for composites.
    #[must_use]
    pub fn kind(&self) -> &str {
        match &self.body {
            NodeBody::Leaf(leaf) => leaf.interface.kind(),
            NodeBody::Composite(_) => COMPOSITE_KIND,
        }
    }

    /// Returns true if the node embeds a graph.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self.body, NodeBody::Composite(_))
    }

    /// Returns the embedded graph of a composite node.
    #[must_use]
    pub fn as_graph(&self) -> Option<&Graph> {
        match &self.body {
            NodeBody::Composite(graph) => Some(graph),
            NodeBody::Leaf(_) => None,
        }
    }

    /// Returns the embedded graph of a composite node, mutably.
    pub fn as_graph_mut(&mut self) -> Option<&mut Graph> {
        match &mut self.body {
            NodeBody::Composite(graph) => Some(graph),
            NodeBody::Leaf(_) => None,
        }
    }

    /// Returns the declared ports of a leaf node.
    #[must_use]
    pub fn ports(&self) -> Option<&PortSpec> {
        match &self.body {
            NodeBody::Leaf(leaf) => Some(&leaf.ports),
            NodeBody::Composite(_) => None,
        }
    }

    /// Returns the payload of a leaf node.
    #[must_use]
    pub fn interface(&self) -> Option<&Arc<dyn Interface>> {
        match &self.body {
            NodeBody::Leaf(leaf) => Some(&leaf.interface),
            NodeBody::Composite(_) => None,
        }
    }

    /// Returns true if `port` resolves to an input of this node.
    #[must_use]
    pub fn has_input(&self, port: &str) -> bool {
        match &self.body {
            NodeBody::Leaf(leaf) => leaf.ports.has_input(port),
            NodeBody::Composite(graph) => port
                .split_once(PATH_SEPARATOR)
                .and_then(|(child, rest)| graph.node(child).map(|n| n.has_input(rest)))
                .unwrap_or(false),
        }
    }

    /// Returns true if `port` resolves to an output of this node.
    #[must_use]
    pub fn has_output(&self, port: &str) -> bool {
        match &self.body {
            NodeBody::Leaf(leaf) => leaf.ports.has_output(port),
            NodeBody::Composite(graph) => port
                .split_once(PATH_SEPARATOR)
                .and_then(|(child, rest)| graph.node(child).map(|n| n.has_output(rest)))
                .unwrap_or(false),
        }
    }

    /// Binds a static value to an input port.
    ///
    /// # Errors
    ///
    /// Returns `PortMismatch` if the port is not declared.
    pub fn set_input(
        &mut self,
        port: &str,
        value: impl Into<PortValue>,
    ) -> Result<(), TractifyError> {
        let name = &self.name;
        match &mut self.body {
            NodeBody::Leaf(leaf) => {
                if !leaf.ports.has_input(port) {
                    return Err(PortMismatchError::input(name, port).into());
                }
                leaf.inputs.insert(port.to_string(), value.into());
                Ok(())
            }
            NodeBody::Composite(graph) => {
                let target = port
                    .split_once(PATH_SEPARATOR)
                    .and_then(|(child, rest)| graph.node_mut(child).map(|n| (n, rest)));
                match target {
                    Some((child, rest)) => child.set_input(rest, value),
                    None => Err(PortMismatchError::input(name, port).into()),
                }
            }
        }
    }

    /// Returns the value bound to an input port.
    #[must_use]
    pub fn input(&self, port: &str) -> Option<&PortValue> {
        match &self.body {
            NodeBody::Leaf(leaf) => leaf.inputs.get(port),
            NodeBody::Composite(graph) => {
                let (child, rest) = port.split_once(PATH_SEPARATOR)?;
                graph.node(child)?.input(rest)
            }
        }
    }

    /// Returns all static bindings of a leaf node.
    #[must_use]
    pub fn inputs(&self) -> Option<&BTreeMap<String, PortValue>> {
        match &self.body {
            NodeBody::Leaf(leaf) => Some(&leaf.inputs),
            NodeBody::Composite(_) => None,
        }
    }

    /// Returns the execution policy attached to this node.
    ///
    /// For a composite this is the embedded graph's policy.
    #[must_use]
    pub fn policy(&self) -> Option<&ExecutionPolicy> {
        match &self.body {
            NodeBody::Leaf(leaf) => leaf.policy.as_ref(),
            NodeBody::Composite(graph) => graph.policy(),
        }
    }

    /// Replaces the execution policy of this node only.
    pub fn set_policy(&mut self, policy: ExecutionPolicy) {
        match &mut self.body {
            NodeBody::Leaf(leaf) => leaf.policy = Some(policy),
            NodeBody::Composite(graph) => graph.set_policy(policy),
        }
    }
}
