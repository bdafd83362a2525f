//! Error types for graph assembly.
//!
//! Errors are split by the scope at which they can be recovered: a missing
//! input only costs one session, a missing structural image costs a subject
//! (or the whole batch, depending on policy), and wiring errors are always
//! fatal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for tractify operations.
#[derive(Debug, Error)]
pub enum TractifyError {
    /// A required session input could not be located.
    #[error("{0}")]
    MissingRequiredInput(#[from] MissingInputError),

    /// A subject has no structural image at all.
    #[error("No T1 images found for participant {subject}. All workflows require T1 images")]
    NoStructuralImage {
        /// The subject identifier.
        subject: String,
    },

    /// A session identifier cannot name a session pipeline in its subject.
    #[error("Session '{session}' of participant {subject} cannot be assembled: {reason}")]
    InvalidSession {
        /// The subject identifier.
        subject: String,
        /// The offending session identifier.
        session: String,
        /// Why the identifier is unusable.
        reason: String,
    },

    /// A connection or binding referenced a port that does not exist.
    #[error("{0}")]
    PortMismatch(#[from] PortMismatchError),

    /// The graph being assembled is structurally invalid.
    #[error("{0}")]
    Validation(#[from] GraphValidationError),

    /// Batch parameters are invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The discovery layer failed to index a dataset.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The execution engine rejected the assembled graph.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TractifyError {
    /// Creates a missing structural image error.
    #[must_use]
    pub fn no_structural_image(subject: impl Into<String>) -> Self {
        Self::NoStructuralImage {
            subject: subject.into(),
        }
    }

    /// Creates an invalid session error.
    #[must_use]
    pub fn invalid_session(
        subject: impl Into<String>,
        session: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSession {
            subject: subject.into(),
            session: session.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error only invalidates the session being built.
    #[must_use]
    pub const fn is_session_recoverable(&self) -> bool {
        match self {
            Self::MissingRequiredInput(_) | Self::InvalidSession { .. } => true,
            Self::NoStructuralImage { .. }
            | Self::PortMismatch(_)
            | Self::Validation(_)
            | Self::Config(_)
            | Self::Discovery(_)
            | Self::Engine(_)
            | Self::Serialization(_)
            | Self::Io(_) => false,
        }
    }

    /// Returns a short, stable name for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingRequiredInput(_) => "MissingRequiredInput",
            Self::NoStructuralImage { .. } => "NoStructuralImage",
            Self::InvalidSession { .. } => "InvalidSession",
            Self::PortMismatch(_) => "PortMismatch",
            Self::Validation(_) => "Validation",
            Self::Config(_) => "Config",
            Self::Discovery(_) => "Discovery",
            Self::Engine(_) => "Engine",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
        }
    }
}

impl From<serde_json::Error> for TractifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "GRAPH-002-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a required session input cannot be bound.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Required input '{port}' not found for participant {subject} session {session}")]
pub struct MissingInputError {
    /// The subject identifier.
    pub subject: String,
    /// The session identifier.
    pub session: String,
    /// The input port that could not be bound.
    pub port: String,
}

impl MissingInputError {
    /// Creates a new missing input error.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        session: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            session: session.into(),
            port: port.into(),
        }
    }
}

/// Which side of a node a port belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// An input port.
    Input,
    /// An output port.
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Error raised when a port name is not declared on its node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Node '{node}' has no {direction} port '{port}'")]
pub struct PortMismatchError {
    /// The node name.
    pub node: String,
    /// The missing port path.
    pub port: String,
    /// Whether an input or an output port was expected.
    pub direction: PortDirection,
}

impl PortMismatchError {
    /// Creates an error for a missing input port.
    #[must_use]
    pub fn input(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            direction: PortDirection::Input,
        }
    }

    /// Creates an error for a missing output port.
    #[must_use]
    pub fn output(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            direction: PortDirection::Output,
        }
    }
}

/// Error raised when graph assembly violates a structural rule.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GraphValidationError {
    /// The error message.
    pub message: String,
    /// The nodes involved in the error.
    pub nodes: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl GraphValidationError {
    /// Creates a new graph validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            nodes: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the nodes involved.
    #[must_use]
    pub fn with_nodes(mut self, nodes: Vec<String>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// A node name was added twice to the same graph.
    #[must_use]
    pub fn duplicate_node(graph: &str, node: &str) -> Self {
        Self::new(format!("Graph '{graph}' already contains a node named '{node}'"))
            .with_nodes(vec![node.to_string()])
            .with_error_info(
                ContractErrorInfo::new(
                    "GRAPH-002-DUPLICATE",
                    format!("Duplicate node name '{node}'"),
                )
                .with_context_entry("graph", graph)
                .with_fix_hint("Node names must be unique within their parent graph."),
            )
    }

    /// A node name was referenced but never added.
    #[must_use]
    pub fn unknown_node(graph: &str, node: &str) -> Self {
        Self::new(format!("Graph '{graph}' has no node named '{node}'"))
            .with_nodes(vec![node.to_string()])
            .with_error_info(
                ContractErrorInfo::new("GRAPH-003-UNKNOWN", format!("Node '{node}' not found"))
                    .with_context_entry("graph", graph)
                    .with_fix_hint("Add the node to the graph before connecting or binding it."),
            )
    }

    /// A node name is empty or contains the path separator.
    #[must_use]
    pub fn invalid_name(node: &str) -> Self {
        Self::new(format!("Invalid node name '{node}'"))
            .with_nodes(vec![node.to_string()])
            .with_error_info(
                ContractErrorInfo::new("GRAPH-001-NAME", "Node names must be non-empty and contain no '.'")
                    .with_fix_hint("Use underscores instead of dots in node names."),
            )
    }

    /// A destination port already has an incoming connection.
    #[must_use]
    pub fn port_already_connected(node: &str, port: &str) -> Self {
        Self::new(format!("Input '{port}' of node '{node}' is already connected"))
            .with_nodes(vec![node.to_string()])
            .with_error_info(
                ContractErrorInfo::new(
                    "GRAPH-005-FAN_IN",
                    format!("Port '{node}.{port}' accepts exactly one incoming connection"),
                )
                .with_fix_hint("Remove the earlier connection or route through a separate node."),
            )
    }

    /// A connection would close a cycle.
    #[must_use]
    pub fn cycle(cycle_path: Vec<String>) -> Self {
        let joined = cycle_path.join(" -> ");
        Self::new(format!("Cycle detected in graph: {joined}"))
            .with_nodes(cycle_path)
            .with_error_info(
                ContractErrorInfo::new(
                    "GRAPH-004-CYCLE",
                    format!("Graph contains a dependency cycle: {joined}"),
                )
                .with_fix_hint("Remove one of the connections in the cycle to break it."),
            )
    }
}
