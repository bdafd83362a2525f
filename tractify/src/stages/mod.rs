//! Factories for the external processing stages.
//!
//! Both stages are opaque: assembly only sees a graph with an `inputnode`,
//! an `outputnode` and a fixed port contract.

pub mod ports;

use crate::errors::TractifyError;
use crate::graph::{ExternalInterface, Graph, Node, PortSpec, INPUT_NODE, OUTPUT_NODE};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Name of the tractography stage graph.
pub const TRACT_STAGE: &str = "tract_wf";

/// Name of the output-writing stage graph.
pub const OUTPUT_STAGE: &str = "tract_output_wf";

const DATASINK: &str = "datasink";

/// Produces fresh stage graphs for each session.
///
/// Every call must return a new, independent instance: an execution engine
/// identifies work by node name and identity, so instances are never shared
/// between sessions.
pub trait StageGraphFactory: Send + Sync + Debug {
    /// Builds the tractography stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage graph cannot be assembled.
    fn tractography(&self) -> Result<Graph, TractifyError>;

    /// Builds the output-writing stage for one subject and session.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage graph cannot be assembled.
    fn output_writer(&self, subject_id: &str, session_id: &str) -> Result<Graph, TractifyError>;
}

/// Default stage factory.
///
/// Each stage is `inputnode -> <opaque node> -> outputnode`, where the
/// opaque node stands for the collaborator's implementation.
#[derive(Debug, Clone, Default)]
pub struct TractographyStages;

impl TractographyStages {
    /// Creates the default factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StageGraphFactory for TractographyStages {
    fn tractography(&self) -> Result<Graph, TractifyError> {
        let inputs = ports::tract_inputs();
        let outputs = ports::TRACT_OUTPUTS;

        let mut graph = Graph::new(TRACT_STAGE);
        graph.add_node(Node::identity(INPUT_NODE, &inputs))?;
        graph.add_node(Node::leaf(
            "tractography",
            Arc::new(ExternalInterface::new(
                "tractify.tractography",
                PortSpec::new(inputs.iter().copied(), outputs),
            )),
        ))?;
        graph.add_node(Node::identity(OUTPUT_NODE, &outputs))?;

        let passthrough: Vec<(&str, &str)> = inputs.iter().map(|p| (*p, *p)).collect();
        graph.connect_many(INPUT_NODE, "tractography", &passthrough)?;
        let results: Vec<(&str, &str)> = outputs.iter().map(|p| (*p, *p)).collect();
        graph.connect_many("tractography", OUTPUT_NODE, &results)?;

        Ok(graph)
    }

    fn output_writer(&self, subject_id: &str, session_id: &str) -> Result<Graph, TractifyError> {
        debug!(subject = subject_id, session = session_id, "Building output writer stage");
        let inputs = ports::writer_inputs();

        let mut graph = Graph::new(OUTPUT_STAGE);
        graph.add_node(Node::identity(INPUT_NODE, &inputs))?;
        graph.add_node(Node::leaf(
            DATASINK,
            Arc::new(ExternalInterface::new(
                "tractify.datasink",
                PortSpec::new(inputs.iter().copied(), std::iter::empty::<&str>()),
            )),
        ))?;

        let passthrough: Vec<(&str, &str)> = inputs.iter().map(|p| (*p, *p)).collect();
        graph.connect_many(INPUT_NODE, DATASINK, &passthrough)?;

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tractography_contract() {
        let graph = TractographyStages::new().tractography().unwrap();
        let node = Node::composite(graph);

        for port in ports::TRACT_REQUIRED_INPUTS {
            assert!(node.has_input(&format!("inputnode.{port}")), "missing input {port}");
        }
        for port in ports::TRACT_OUTPUTS {
            assert!(node.has_output(&format!("outputnode.{port}")), "missing output {port}");
        }
        assert_eq!(node.name(), TRACT_STAGE);
    }

    #[test]
    fn test_output_writer_contract() {
        let graph = TractographyStages::new().output_writer("01", "02").unwrap();
        let node = Node::composite(graph);
        for port in ports::writer_inputs() {
            assert!(node.has_input(&format!("inputnode.{port}")));
        }
        assert!(node
            .as_graph()
            .unwrap()
            .node(DATASINK)
            .is_some());
    }

    #[test]
    fn test_each_call_returns_fresh_instance() {
        let factory = TractographyStages::new();
        let mut first = factory.tractography().unwrap();
        let second = factory.tractography().unwrap();

        first
            .input_node_mut()
            .unwrap()
            .set_input(ports::SUBJECT_ID, "01")
            .unwrap();

        assert!(second
            .node(INPUT_NODE)
            .and_then(|n| n.input(ports::SUBJECT_ID))
            .is_none());
    }
}
