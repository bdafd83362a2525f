//! The recursive graph container.

use super::node::{Node, PATH_SEPARATOR};
use super::Connection;
use crate::errors::{GraphValidationError, PortMismatchError, TractifyError};
use crate::policy::ExecutionPolicy;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Name of the node holding a graph's external input bindings.
pub const INPUT_NODE: &str = "inputnode";

/// Name of the node exposing a graph's external outputs.
pub const OUTPUT_NODE: &str = "outputnode";

/// An ordered collection of nodes plus the connections between them.
///
/// A graph can be embedded in a parent graph through [`Node::composite`],
/// to any depth. All structural checks (unique names, declared ports,
/// single fan-in, acyclicity) run when nodes and connections are added.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    base_dir: Option<PathBuf>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    connections: Vec<Connection>,
    policy: Option<ExecutionPolicy>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_dir: None,
            nodes: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
            policy: None,
        }
    }

    /// Sets the working directory the engine uses for this graph.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the working directory, if set.
    #[must_use]
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Sets the working directory.
    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = Some(base_dir.into());
    }

    /// Returns the graph-level policy.
    #[must_use]
    pub fn policy(&self) -> Option<&ExecutionPolicy> {
        self.policy.as_ref()
    }

    /// Sets the graph-level policy without touching member nodes.
    pub fn set_policy(&mut self, policy: ExecutionPolicy) {
        self.policy = Some(policy);
    }

    /// Returns the member nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the number of direct member nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the connections in insertion order.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns the names of the direct member nodes.
    #[must_use]
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(Node::name).collect()
    }

    /// Looks up a direct member node.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Looks up a direct member node mutably.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    /// Looks up a direct member node, failing if it is absent.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing node.
    pub fn get_node(&self, name: &str) -> Result<&Node, TractifyError> {
        self.node(name)
            .ok_or_else(|| GraphValidationError::unknown_node(&self.name, name).into())
    }

    /// Mutable variant of [`Graph::get_node`].
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing node.
    pub fn get_node_mut(&mut self, name: &str) -> Result<&mut Node, TractifyError> {
        let graph = self.name.clone();
        self.node_mut(name)
            .ok_or_else(|| GraphValidationError::unknown_node(&graph, name).into())
    }

    /// Returns the designated input node.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the graph has no `inputnode`.
    pub fn input_node_mut(&mut self) -> Result<&mut Node, TractifyError> {
        self.get_node_mut(INPUT_NODE)
    }

    /// Adds a node.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is invalid or already taken.
    pub fn add_node(&mut self, node: Node) -> Result<(), TractifyError> {
        let name = node.name();
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(GraphValidationError::invalid_name(name).into());
        }
        if self.index.contains_key(name) {
            return Err(GraphValidationError::duplicate_node(&self.name, name).into());
        }

        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Adds several nodes, stopping at the first invalid one.
    ///
    /// # Errors
    ///
    /// See [`Graph::add_node`].
    pub fn add_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> Result<(), TractifyError> {
        for node in nodes {
            self.add_node(node)?;
        }
        Ok(())
    }

    /// Connects an output port of one member node to an input port of another.
    ///
    /// # Errors
    ///
    /// - validation error if either node is unknown, the destination port is
    ///   already fed, or the edge would close a cycle;
    /// - `PortMismatch` if either port is not declared.
    pub fn connect(
        &mut self,
        source: &str,
        source_port: &str,
        dest: &str,
        dest_port: &str,
    ) -> Result<(), TractifyError> {
        if !self.get_node(source)?.has_output(source_port) {
            return Err(PortMismatchError::output(source, source_port).into());
        }
        if !self.get_node(dest)?.has_input(dest_port) {
            return Err(PortMismatchError::input(dest, dest_port).into());
        }
        if self.connections.iter().any(|c| c.targets(dest, dest_port)) {
            return Err(GraphValidationError::port_already_connected(dest, dest_port).into());
        }

        if let Some(mut path) = self.find_path(dest, source) {
            // path runs dest -> ... -> source; the new edge closes it
            path.push(dest.to_string());
            return Err(GraphValidationError::cycle(path).into());
        }

        self.connections
            .push(Connection::new(source, source_port, dest, dest_port));
        Ok(())
    }

    /// Connects several port pairs between the same two nodes.
    ///
    /// # Errors
    ///
    /// See [`Graph::connect`].
    pub fn connect_many(
        &mut self,
        source: &str,
        dest: &str,
        pairs: &[(&str, &str)],
    ) -> Result<(), TractifyError> {
        for (source_port, dest_port) in pairs {
            self.connect(source, source_port, dest, dest_port)?;
        }
        Ok(())
    }

    /// Names of the nodes feeding `name` directly.
    #[must_use]
    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        let mut preds: Vec<&str> = Vec::new();
        for conn in self.connections.iter().filter(|c| c.dest == name) {
            if !preds.contains(&conn.source.as_str()) {
                preds.push(&conn.source);
            }
        }
        preds
    }

    /// Member node names in dependency order, ties broken by insertion order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::new();
        for node in &self.nodes {
            self.visit_in_order(node.name(), &mut visited, &mut result);
        }
        result
    }

    fn visit_in_order<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        result: &mut Vec<&'a str>,
    ) {
        if !visited.insert(node) {
            return;
        }
        for pred in self.predecessors(node) {
            self.visit_in_order(pred, visited, result);
        }
        result.push(node);
    }

    /// Calls `f` with the dotted path and node for every node at every depth,
    /// parents before children.
    pub fn visit_nodes<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&str, &'a Node),
    {
        self.visit_with_prefix("", f);
    }

    fn visit_with_prefix<'a, F>(&'a self, prefix: &str, f: &mut F)
    where
        F: FnMut(&str, &'a Node),
    {
        for node in &self.nodes {
            let path = if prefix.is_empty() {
                node.name().to_string()
            } else {
                format!("{prefix}{PATH_SEPARATOR}{}", node.name())
            };
            f(&path, node);
            if let Some(inner) = node.as_graph() {
                inner.visit_with_prefix(&path, f);
            }
        }
    }

    /// Every node at every depth, keyed by dotted path.
    #[must_use]
    pub fn all_nodes(&self) -> Vec<(String, &Node)> {
        let mut out = Vec::new();
        self.visit_nodes(&mut |path, node| out.push((path.to_string(), node)));
        out
    }

    /// Calls `f` on every node at every depth, parents before children.
    pub fn for_each_node_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Node),
    {
        for node in &mut self.nodes {
            f(node);
            if let Some(inner) = node.as_graph_mut() {
                inner.for_each_node_mut(f);
            }
        }
    }

    /// Deep-copies `policy` onto this graph and every node it contains.
    ///
    /// Returns the number of nodes updated.
    pub fn propagate_policy(&mut self, policy: &ExecutionPolicy) -> usize {
        self.policy = Some(policy.clone());
        let mut updated = 0;
        self.for_each_node_mut(&mut |node| {
            node.set_policy(policy.clone());
            updated += 1;
        });
        updated
    }

    /// Depth-first search for a path `from -> ... -> to` along connections.
    fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if self.dfs_path(from, to, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs_path<'a>(
        &'a self,
        node: &'a str,
        target: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<String>,
    ) -> bool {
        path.push(node.to_string());
        if node == target {
            return true;
        }
        if visited.insert(node) {
            for conn in self.connections.iter().filter(|c| c.source == node) {
                if self.dfs_path(&conn.dest, target, visited, path) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }
}
