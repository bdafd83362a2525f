//! Execution engine seam.
//!
//! Assembly ends with a graph handed to an [`ExecutionEngine`]. Running the
//! external stages is the engine's business; this crate ships only
//! [`PlanOnlyEngine`], which validates and records what would run.

use crate::errors::TractifyError;
use crate::graph::{FlatNode, Graph};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Ordered leaf steps of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Root graph name.
    pub graph: String,
    /// Topology fingerprint.
    pub fingerprint: String,
    /// Leaf nodes in execution order.
    pub steps: Vec<FlatNode>,
}

impl ExecutionPlan {
    /// Builds the plan of `graph`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the fingerprint cannot be computed.
    pub fn from_graph(graph: &Graph) -> Result<Self, TractifyError> {
        Ok(Self {
            graph: graph.name().to_string(),
            fingerprint: graph.fingerprint()?,
            steps: graph.flatten(),
        })
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome of handing a graph to an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Engine name.
    pub engine: String,
    /// Root graph name.
    pub graph: String,
    /// Leaf nodes scheduled.
    pub nodes_planned: usize,
    /// Leaf nodes actually executed.
    pub nodes_executed: usize,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// The plan, if the engine produced one.
    pub plan: Option<ExecutionPlan>,
}

/// Something that can run an assembled graph.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Engine name, for logs and summaries.
    fn name(&self) -> &str;

    /// Runs `graph` to completion.
    async fn run(&self, graph: &Graph) -> Result<RunSummary, TractifyError>;
}

/// Engine that validates a graph and produces its plan without running it.
///
/// Every leaf must carry an execution policy, so a graph that skipped
/// policy propagation is rejected.
#[derive(Debug, Clone, Default)]
pub struct PlanOnlyEngine {
    plan_file: Option<PathBuf>,
}

impl PlanOnlyEngine {
    /// Creates the engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also writes the plan as pretty JSON to `path`.
    #[must_use]
    pub fn with_plan_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.plan_file = Some(path.into());
        self
    }
}

#[async_trait]
impl ExecutionEngine for PlanOnlyEngine {
    fn name(&self) -> &str {
        "plan_only"
    }

    async fn run(&self, graph: &Graph) -> Result<RunSummary, TractifyError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let plan = ExecutionPlan::from_graph(graph)?;
        if let Some(step) = plan.steps.iter().find(|s| s.crashdump_dir.is_none()) {
            return Err(TractifyError::Engine(format!(
                "Node '{}' has no execution policy",
                step.path
            )));
        }

        if let Some(path) = &self.plan_file {
            let json = serde_json::to_string_pretty(&plan)?;
            tokio::fs::write(path, json).await?;
            debug!(path = %path.display(), "Wrote execution plan");
        }

        info!(
            graph = graph.name(),
            steps = plan.len(),
            fingerprint = %plan.fingerprint,
            "Planned graph"
        );

        Ok(RunSummary {
            run_id: Uuid::new_v4(),
            engine: self.name().to_string(),
            graph: graph.name().to_string(),
            nodes_planned: plan.len(),
            nodes_executed: 0,
            started_at,
            duration_ms: timer.elapsed().as_secs_f64() * 1000.0,
            plan: Some(plan),
        })
    }
}
