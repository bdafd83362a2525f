//! Batch-level composition.

use super::report::{AssemblyReport, SkipRecord};
use super::subject::SubjectGraphBuilder;
use super::{subject_graph_name, BATCH_GRAPH};
use crate::config::BatchParameters;
use crate::errors::TractifyError;
use crate::graph::{Graph, Node};
use crate::observability::SpanTimer;
use crate::policy::SubjectFailurePolicy;
use crate::resolver::InputSource;
use crate::stages::{StageGraphFactory, TractographyStages};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A composed batch graph and the report of how it was built.
#[derive(Debug)]
pub struct ComposedBatch {
    /// The top-level `tractify_wf` graph.
    pub graph: Graph,
    /// What was assembled and what was skipped.
    pub report: AssemblyReport,
}

/// Composes one subject graph per subject into a single batch graph.
///
/// Subject graphs share no nodes. After composition every subject graph,
/// and every node inside it at any depth, carries a policy whose crash
/// directory is `<output_dir>/tractify_crash/sub-<id>/log`.
#[derive(Debug, Clone)]
pub struct BatchGraphComposer {
    params: BatchParameters,
    source: InputSource,
    factory: Arc<dyn StageGraphFactory>,
}

impl BatchGraphComposer {
    /// Creates a composer with the default stage factory.
    #[must_use]
    pub fn new(params: BatchParameters, source: InputSource) -> Self {
        Self {
            params,
            source,
            factory: Arc::new(TractographyStages::new()),
        }
    }

    /// Validates the parameters and derives the input source from them.
    ///
    /// # Errors
    ///
    /// Returns a configuration or discovery error.
    pub fn from_parameters(params: BatchParameters) -> Result<Self, TractifyError> {
        params.validate()?;
        let source = InputSource::from_parameters(&params)?;
        Ok(Self::new(params, source))
    }

    /// Replaces the stage factory.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn StageGraphFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Batch parameters in use.
    #[must_use]
    pub const fn params(&self) -> &BatchParameters {
        &self.params
    }

    /// Composes the batch graph.
    ///
    /// # Errors
    ///
    /// See [`BatchGraphComposer::compose_with_report`].
    pub fn compose(&self) -> Result<Graph, TractifyError> {
        self.compose_with_report().map(|batch| batch.graph)
    }

    /// Composes the batch graph and reports skipped subjects and sessions.
    ///
    /// Every call builds a fresh graph; nothing is shared between calls.
    ///
    /// # Errors
    ///
    /// - `NoStructuralImage` under [`SubjectFailurePolicy::Abort`];
    /// - any wiring or validation error, whatever the policy.
    pub fn compose_with_report(&self) -> Result<ComposedBatch, TractifyError> {
        let timer = SpanTimer::start("compose_batch");
        let mut report = AssemblyReport::new();
        info!(
            build_id = %report.build_id,
            subjects = self.params.subject_list.len(),
            "Composing batch graph"
        );

        if matches!(self.source, InputSource::Enumerated(_)) && self.params.subject_list.len() > 1 {
            warn!(
                subjects = self.params.subject_list.len(),
                "Explicit session files are applied to every subject"
            );
        }

        let builder = SubjectGraphBuilder::new(&self.params, &self.source, self.factory.as_ref());
        let mut graph = Graph::new(BATCH_GRAPH).with_base_dir(&self.params.work_dir);

        for subject_id in &self.params.subject_list {
            match builder.build(subject_id) {
                Ok(assembly) => {
                    graph.add_node(Node::composite(assembly.graph))?;
                    report.assembled_subjects.push(subject_id.clone());
                    report.session_count += assembly.sessions.len();
                    report.skipped_sessions.extend(assembly.skipped);
                }
                Err(err @ TractifyError::NoStructuralImage { .. })
                    if self.params.on_missing_structural == SubjectFailurePolicy::Skip =>
                {
                    warn!(subject = %subject_id, error = %err, "Skipping subject");
                    report.skipped_subjects.push(SkipRecord::subject(subject_id, &err));
                }
                Err(err) => {
                    error!(
                        subject = %subject_id,
                        error = %err,
                        kind = err.kind(),
                        "Batch composition failed"
                    );
                    return Err(err);
                }
            }
        }

        let updated = self.propagate_policies(&mut graph, &report.assembled_subjects);
        report.duration_ms = timer.finish();

        info!(
            build_id = %report.build_id,
            subjects = report.assembled_subjects.len(),
            sessions = report.session_count,
            skipped_subjects = report.skipped_subjects.len(),
            skipped_sessions = report.skipped_sessions.len(),
            policy_nodes = updated,
            duration_ms = report.duration_ms,
            "Batch graph composed"
        );
        Ok(ComposedBatch { graph, report })
    }

    /// Applies the batch policy to the top-level graph and a per-subject
    /// copy to each subject graph and all its descendants.
    fn propagate_policies(&self, graph: &mut Graph, subjects: &[String]) -> usize {
        let batch_policy = self.params.execution_policy();
        let mut updated = 0;

        for subject_id in subjects {
            let policy = batch_policy.for_subject(&self.params.output_dir, subject_id);
            if let Some(inner) = graph
                .node_mut(&subject_graph_name(subject_id))
                .and_then(Node::as_graph_mut)
            {
                updated += inner.propagate_policy(&policy);
            }
        }

        graph.set_policy(batch_policy);
        updated
    }
}
