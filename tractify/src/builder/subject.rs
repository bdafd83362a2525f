//! Per-subject graph assembly.

use super::report::SkipRecord;
use super::{session_graph_name, subject_graph_name};
use crate::config::{BatchParameters, PipelineVariant};
use crate::errors::TractifyError;
use crate::graph::{Graph, Node, INPUT_NODE, OUTPUT_NODE, PATH_SEPARATOR};
use crate::resolver::{InputSource, PortBindingResolver, SessionCandidate};
use crate::stages::{ports, StageGraphFactory, OUTPUT_STAGE, TRACT_STAGE};
use tracing::{debug, info, warn};

/// A subject graph plus the sessions that were left out of it.
#[derive(Debug)]
pub struct SubjectAssembly {
    /// The `single_subject_<id>_wf` graph.
    pub graph: Graph,
    /// Sessions present in the graph, in discovery order.
    pub sessions: Vec<String>,
    /// Sessions skipped for missing inputs.
    pub skipped: Vec<SkipRecord>,
}

/// Builds the graph of one subject: one isolated session pipeline per
/// structural image.
#[derive(Debug, Clone, Copy)]
pub struct SubjectGraphBuilder<'a> {
    params: &'a BatchParameters,
    resolver: PortBindingResolver<'a>,
    factory: &'a dyn StageGraphFactory,
}

impl<'a> SubjectGraphBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub const fn new(
        params: &'a BatchParameters,
        source: &'a InputSource,
        factory: &'a dyn StageGraphFactory,
    ) -> Self {
        Self {
            params,
            resolver: PortBindingResolver::new(params, source),
            factory,
        }
    }

    /// Builds the subject graph.
    ///
    /// A session whose inputs cannot be resolved, or whose identifier is
    /// unusable or already taken by an earlier structural image, is skipped
    /// and recorded. Every other error aborts the subject.
    ///
    /// # Errors
    ///
    /// - `NoStructuralImage` if the subject has no structural image;
    /// - `PortMismatch` or a validation error if a stage does not honour
    ///   its port contract.
    pub fn build(&self, subject_id: &str) -> Result<SubjectAssembly, TractifyError> {
        let candidates = self.resolver.structural_candidates(subject_id)?;

        let mut graph = Graph::new(subject_graph_name(subject_id));
        let mut sessions = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();

        for candidate in &candidates {
            let built = check_session_id(&graph, subject_id, &candidate.session_id)
                .and_then(|()| self.build_session(subject_id, candidate));
            match built {
                Ok(session_graph) => {
                    graph.add_node(Node::composite(session_graph))?;
                    sessions.push(candidate.session_id.clone());
                }
                Err(err) if err.is_session_recoverable() => {
                    warn!(
                        subject = subject_id,
                        session = %candidate.session_id,
                        structural = %candidate.structural.display(),
                        error = %err,
                        "Skipping session"
                    );
                    skipped.push(SkipRecord::session(subject_id, &candidate.session_id, &err));
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            subject = subject_id,
            sessions = sessions.len(),
            skipped = skipped.len(),
            "Assembled subject graph"
        );
        Ok(SubjectAssembly {
            graph,
            sessions,
            skipped,
        })
    }

    /// Builds the `sub_<id>_ses_<ses>_preproc_wf` graph for one session.
    ///
    /// # Errors
    ///
    /// `MissingRequiredInput` if resolution fails, or whatever the stage
    /// factory and graph assembly return.
    pub fn build_session(
        &self,
        subject_id: &str,
        candidate: &SessionCandidate,
    ) -> Result<Graph, TractifyError> {
        let session_id = candidate.session_id.as_str();
        let bindings = self.resolver.resolve(subject_id, candidate)?;

        let mut tract = self.factory.tractography()?;
        tract.set_base_dir(self.params.work_dir.join(format!("sub-{subject_id}")));
        bindings.apply_to(tract.input_node_mut()?)?;

        let mut session = Graph::new(session_graph_name(subject_id, session_id));
        session.add_node(Node::composite(tract))?;

        if self.params.variant == PipelineVariant::Full {
            let mut writer = self.factory.output_writer(subject_id, session_id)?;
            let input = writer.input_node_mut()?;
            input.set_input(ports::SUBJECT_ID, subject_id)?;
            input.set_input(ports::SESSION_ID, session_id)?;
            input.set_input(ports::OUTPUT_FOLDER, self.params.output_dir.as_path())?;
            session.add_node(Node::composite(writer))?;

            for port in ports::TRACT_OUTPUTS {
                session.connect(
                    TRACT_STAGE,
                    &format!("{OUTPUT_NODE}{PATH_SEPARATOR}{port}"),
                    OUTPUT_STAGE,
                    &format!("{INPUT_NODE}{PATH_SEPARATOR}{port}"),
                )?;
            }
        }

        debug!(
            subject = subject_id,
            session = session_id,
            nodes = session.node_count(),
            "Built session pipeline"
        );
        Ok(session)
    }
}

/// Rejects a session identifier that cannot become a new node of `graph`.
fn check_session_id(
    graph: &Graph,
    subject_id: &str,
    session_id: &str,
) -> Result<(), TractifyError> {
    if session_id.is_empty() || session_id.contains(PATH_SEPARATOR) {
        return Err(TractifyError::invalid_session(
            subject_id,
            session_id,
            format!("identifier must be non-empty and contain no '{PATH_SEPARATOR}'"),
        ));
    }
    if graph.node(&session_graph_name(subject_id, session_id)).is_some() {
        return Err(TractifyError::invalid_session(
            subject_id,
            session_id,
            "another structural image already maps to this session",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionFiles;
    use crate::graph::PortValue;
    use std::path::PathBuf;

    fn enumerated() -> SessionFiles {
        SessionFiles {
            session_id: Some("02".to_string()),
            t1_file: Some(PathBuf::from("/in/t1.nii.gz")),
            eddy_file: Some(PathBuf::from("/in/eddy.nii.gz")),
            bvec_file: Some(PathBuf::from("/in/dwi.bvec")),
            bval_file: Some(PathBuf::from("/in/dwi.bval")),
            ..SessionFiles::default()
        }
    }

    fn params() -> BatchParameters {
        BatchParameters::new(["01"], "/work", "/out", "/tpl/mni.nii.gz", "/tpl/shen.nii.gz")
            .with_session_files(enumerated())
    }

    #[test]
    fn test_full_session_layout() {
        let params = params();
        let source = InputSource::Enumerated(enumerated());
        let factory = crate::stages::TractographyStages::new();
        let builder = SubjectGraphBuilder::new(&params, &source, &factory);

        let assembly = builder.build("01").unwrap();
        assert_eq!(assembly.graph.name(), "single_subject_01_wf");
        assert_eq!(assembly.sessions, vec!["02".to_string()]);
        assert!(assembly.skipped.is_empty());

        let session = assembly
            .graph
            .node("sub_01_ses_02_preproc_wf")
            .and_then(Node::as_graph)
            .unwrap();
        assert_eq!(session.node_names(), vec![TRACT_STAGE, OUTPUT_STAGE]);
        assert_eq!(session.connections().len(), 6);

        let tract = session.node(TRACT_STAGE).unwrap();
        assert_eq!(
            tract.as_graph().unwrap().base_dir(),
            Some(PathBuf::from("/work/sub-01").as_path())
        );
        assert_eq!(
            tract.input("inputnode.session_id"),
            Some(&PortValue::from("02"))
        );

        let writer = session.node(OUTPUT_STAGE).unwrap();
        assert_eq!(
            writer.input("inputnode.output_folder"),
            Some(&PortValue::from(PathBuf::from("/out")))
        );
    }

    #[test]
    fn test_tractography_only_variant() {
        let params = params().with_variant(PipelineVariant::TractographyOnly);
        let source = InputSource::Enumerated(enumerated());
        let factory = crate::stages::TractographyStages::new();
        let builder = SubjectGraphBuilder::new(&params, &source, &factory);

        let assembly = builder.build("01").unwrap();
        let session = assembly.graph.nodes()[0].as_graph().unwrap();
        assert_eq!(session.node_names(), vec![TRACT_STAGE]);
        assert!(session.connections().is_empty());
    }

    #[test]
    fn test_missing_diffusion_skips_session() {
        let files = SessionFiles {
            bval_file: None,
            ..enumerated()
        };
        let params = params();
        let source = InputSource::Enumerated(files);
        let factory = crate::stages::TractographyStages::new();
        let builder = SubjectGraphBuilder::new(&params, &source, &factory);

        let assembly = builder.build("01").unwrap();
        assert!(assembly.graph.is_empty());
        assert_eq!(assembly.skipped.len(), 1);
        assert_eq!(assembly.skipped[0].session.as_deref(), Some("02"));
        assert_eq!(assembly.skipped[0].error_kind, "MissingRequiredInput");
    }

    #[test]
    fn test_dotted_session_id_is_skipped() {
        let files = SessionFiles {
            session_id: Some("1.5".to_string()),
            ..enumerated()
        };
        let params = params();
        let source = InputSource::Enumerated(files);
        let factory = crate::stages::TractographyStages::new();
        let builder = SubjectGraphBuilder::new(&params, &source, &factory);

        let assembly = builder.build("01").unwrap();
        assert!(assembly.graph.is_empty());
        assert_eq!(assembly.skipped.len(), 1);
        assert_eq!(assembly.skipped[0].session.as_deref(), Some("1.5"));
        assert_eq!(assembly.skipped[0].error_kind, "InvalidSession");
    }

    #[test]
    fn test_missing_structural_is_subject_error() {
        let params = params();
        let source = InputSource::Enumerated(SessionFiles::default());
        let factory = crate::stages::TractographyStages::new();
        let builder = SubjectGraphBuilder::new(&params, &source, &factory);

        let err = builder.build("01").unwrap_err();
        assert!(matches!(err, TractifyError::NoStructuralImage { .. }));
    }
}
