//! Mock engines and stage factories.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::{ExecutionEngine, ExecutionPlan, RunSummary};
use crate::errors::TractifyError;
use crate::graph::{ExternalInterface, Graph, Node, PortSpec, INPUT_NODE, OUTPUT_NODE};
use crate::stages::{ports, StageGraphFactory, TractographyStages, TRACT_STAGE};

/// An engine that records every graph it is given.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    runs: Mutex<Vec<ExecutionPlan>>,
}

impl RecordingEngine {
    /// Creates a new recording engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }

    /// Returns the plans of every run, oldest first.
    #[must_use]
    pub fn recorded_plans(&self) -> Vec<ExecutionPlan> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl ExecutionEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&self, graph: &Graph) -> Result<RunSummary, TractifyError> {
        let plan = ExecutionPlan::from_graph(graph)?;
        let nodes = plan.len();
        self.runs.lock().push(plan.clone());
        Ok(RunSummary {
            run_id: uuid::Uuid::new_v4(),
            engine: self.name().to_string(),
            graph: graph.name().to_string(),
            nodes_planned: nodes,
            nodes_executed: nodes,
            started_at: Utc::now(),
            duration_ms: 0.0,
            plan: Some(plan),
        })
    }
}

/// Default stages, counting how many instances were produced.
#[derive(Debug, Default)]
pub struct CountingStages {
    inner: TractographyStages,
    tractography: AtomicUsize,
    writers: AtomicUsize,
}

impl CountingStages {
    /// Creates a counting factory.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tractography stages built so far.
    #[must_use]
    pub fn tractography_count(&self) -> usize {
        self.tractography.load(Ordering::SeqCst)
    }

    /// Output writer stages built so far.
    #[must_use]
    pub fn writer_count(&self) -> usize {
        self.writers.load(Ordering::SeqCst)
    }
}

impl StageGraphFactory for CountingStages {
    fn tractography(&self) -> Result<Graph, TractifyError> {
        self.tractography.fetch_add(1, Ordering::SeqCst);
        self.inner.tractography()
    }

    fn output_writer(&self, subject_id: &str, session_id: &str) -> Result<Graph, TractifyError> {
        self.writers.fetch_add(1, Ordering::SeqCst);
        self.inner.output_writer(subject_id, session_id)
    }
}

/// A factory whose tractography stage omits one declared output.
#[derive(Debug, Clone)]
pub struct MisdeclaredStages {
    missing_output: &'static str,
}

impl MisdeclaredStages {
    /// Creates a factory whose tractography stage lacks `missing_output`.
    #[must_use]
    pub const fn without_output(missing_output: &'static str) -> Self {
        Self { missing_output }
    }
}

impl StageGraphFactory for MisdeclaredStages {
    fn tractography(&self) -> Result<Graph, TractifyError> {
        let inputs = ports::tract_inputs();
        let outputs: Vec<&str> = ports::TRACT_OUTPUTS
            .into_iter()
            .filter(|p| *p != self.missing_output)
            .collect();

        let mut graph = Graph::new(TRACT_STAGE);
        graph.add_node(Node::identity(INPUT_NODE, &inputs))?;
        graph.add_node(Node::leaf(
            "broken_tractography",
            Arc::new(ExternalInterface::new(
                "tests.broken",
                PortSpec::new(inputs.iter().copied(), outputs.iter().copied()),
            )),
        ))?;
        graph.add_node(Node::identity(OUTPUT_NODE, &outputs))?;
        Ok(graph)
    }

    fn output_writer(&self, subject_id: &str, session_id: &str) -> Result<Graph, TractifyError> {
        TractographyStages::new().output_writer(subject_id, session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_engine() {
        let engine = RecordingEngine::new();
        let graph = TractographyStages::new().tractography().unwrap();
        let summary = engine.run(&graph).await.unwrap();

        assert_eq!(engine.run_count(), 1);
        assert_eq!(summary.nodes_executed, 3);
        assert_eq!(engine.recorded_plans()[0].graph, TRACT_STAGE);
    }

    #[test]
    fn test_counting_stages() {
        let factory = CountingStages::new();
        factory.tractography().unwrap();
        factory.output_writer("01", "01").unwrap();
        factory.output_writer("01", "02").unwrap();
        assert_eq!(factory.tractography_count(), 1);
        assert_eq!(factory.writer_count(), 2);
    }

    #[test]
    fn test_misdeclared_stage_lacks_output() {
        let graph = MisdeclaredStages::without_output(ports::LEN_CONMAT)
            .tractography()
            .unwrap();
        let node = Node::composite(graph);
        assert!(!node.has_output("outputnode.len_conmat"));
        assert!(node.has_output("outputnode.fod_file"));
    }
}
