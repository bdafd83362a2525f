//! End-to-end tests for batch graph composition.

#[cfg(test)]
mod tests {
    use crate::builder::{
        session_graph_name, subject_graph_name, BatchGraphComposer, SubjectGraphBuilder,
        BATCH_GRAPH,
    };
    use crate::config::{BatchParameters, PipelineVariant, SessionFiles};
    use crate::discovery::{Metadata, QueryScope};
    use crate::engine::{ExecutionEngine, PlanOnlyEngine};
    use crate::errors::TractifyError;
    use crate::graph::{Connection, Graph, Node, PortValue};
    use crate::policy::{subject_crash_dir, SubjectFailurePolicy};
    use crate::resolver::InputSource;
    use crate::stages::{ports, TractographyStages, OUTPUT_STAGE, TRACT_STAGE};
    use crate::testing::{
        sample_parameters, CountingStages, DatasetFixture, MisdeclaredStages, RecordingEngine,
    };
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn composer(fixture: &DatasetFixture, subjects: &[&str]) -> BatchGraphComposer {
        BatchGraphComposer::new(sample_parameters(subjects, fixture), fixture.source())
    }

    fn subject<'g>(batch: &'g Graph, id: &str) -> &'g Graph {
        batch
            .node(&subject_graph_name(id))
            .and_then(Node::as_graph)
            .unwrap_or_else(|| panic!("subject {id} missing"))
    }

    fn session<'g>(batch: &'g Graph, id: &str, ses: &str) -> &'g Graph {
        subject(batch, id)
            .node(&session_graph_name(id, ses))
            .and_then(Node::as_graph)
            .unwrap_or_else(|| panic!("session {ses} of {id} missing"))
    }

    #[test]
    fn test_one_session_node_per_bindable_session() {
        let fixture = DatasetFixture::new()
            .with_complete_session("01", Some("a"))
            .with_complete_session("01", Some("b"))
            .with_complete_session("02", None);

        let batch = composer(&fixture, &["01", "02"]).compose().unwrap();

        assert_eq!(batch.name(), BATCH_GRAPH);
        assert_eq!(
            subject(&batch, "01").node_names(),
            vec!["sub_01_ses_a_preproc_wf", "sub_01_ses_b_preproc_wf"]
        );
        assert_eq!(
            subject(&batch, "02").node_names(),
            vec!["sub_02_ses_01_preproc_wf"]
        );
    }

    #[test]
    fn test_session_missing_diffusion_is_isolated() {
        let both = DatasetFixture::new()
            .with_complete_session("01", Some("a"))
            .with_structural("01", Some("b"));
        let only_a = DatasetFixture::new().with_complete_session("01", Some("a"));

        let composed = composer(&both, &["01"]).compose_with_report().unwrap();
        let reference = composer(&only_a, &["01"]).compose().unwrap();

        assert_eq!(subject(&composed.graph, "01").node_count(), 1);
        assert_eq!(
            session(&composed.graph, "01", "a").summary(),
            session(&reference, "01", "a").summary()
        );

        let skipped = &composed.report.skipped_sessions;
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].subject, "01");
        assert_eq!(skipped[0].session.as_deref(), Some("b"));
        assert!(skipped[0].reason.contains(ports::EDDY_FILE));
    }

    #[test]
    fn test_policy_reaches_every_depth() {
        let fixture = DatasetFixture::new()
            .with_complete_session("01", Some("a"))
            .with_complete_session("01", Some("b"))
            .with_complete_session("02", None);
        let params = sample_parameters(&["01", "02"], &fixture);
        let output_dir = params.output_dir.clone();

        let batch = BatchGraphComposer::new(params, fixture.source())
            .compose()
            .unwrap();

        assert_eq!(
            batch.policy().unwrap().crashdump_dir,
            PathBuf::from("/out/tractify_crash")
        );
        for id in ["01", "02"] {
            let expected = subject_crash_dir(&output_dir, id);
            let node = batch.node(&subject_graph_name(id)).unwrap();
            assert_eq!(node.policy().unwrap().crashdump_dir, expected);

            let nodes = subject(&batch, id).all_nodes();
            assert!(nodes.iter().any(|(path, _)| path.matches('.').count() >= 2));
            for (path, node) in nodes {
                let policy = node.policy().unwrap_or_else(|| panic!("{path} has no policy"));
                assert_eq!(policy.crashdump_dir, expected, "wrong crash dir at {path}");
            }
        }

        for step in batch.flatten() {
            let id = if step.path.starts_with("single_subject_01_wf.") {
                "01"
            } else {
                "02"
            };
            assert_eq!(step.crashdump_dir, Some(subject_crash_dir(&output_dir, id)));
        }
    }

    #[test]
    fn test_stage_wiring_is_exactly_six_pairs() {
        let fixture = DatasetFixture::new().with_complete_session("01", None);
        let batch = composer(&fixture, &["01"]).compose().unwrap();

        let expected: Vec<Connection> = [
            "fod_file",
            "gmwmi_file",
            "prob_weights",
            "shen_diff_space",
            "inv_len_conmat",
            "len_conmat",
        ]
        .iter()
        .map(|port| {
            Connection::new(
                TRACT_STAGE,
                format!("outputnode.{port}"),
                OUTPUT_STAGE,
                format!("inputnode.{port}"),
            )
        })
        .collect();

        assert_eq!(session(&batch, "01", "01").connections(), expected.as_slice());
    }

    #[test]
    fn test_static_bindings_on_session_nodes() {
        let fixture = DatasetFixture::new().with_complete_session("01", Some("a"));
        let batch = composer(&fixture, &["01"]).compose().unwrap();
        let session = session(&batch, "01", "a");

        let tract = session.node(TRACT_STAGE).unwrap();
        assert_eq!(
            tract.input("inputnode.t1_file"),
            Some(&PortValue::from(PathBuf::from(
                "/bids/sub-01/ses-a/anat/sub-01_ses-a_T1w.nii.gz"
            )))
        );
        assert_eq!(
            tract.input("inputnode.template"),
            Some(&PortValue::from(PathBuf::from("/templates/mni_1mm.nii.gz")))
        );
        assert_eq!(tract.input("inputnode.num_tracts"), Some(&PortValue::Integer(10_000)));
        assert_eq!(tract.input("inputnode.eddy_mask"), None);

        let writer = session.node(OUTPUT_STAGE).unwrap();
        assert_eq!(writer.input("inputnode.subject_id"), Some(&PortValue::from("01")));
        assert_eq!(writer.input("inputnode.session_id"), Some(&PortValue::from("a")));
    }

    #[test]
    fn test_missing_structural_aborts_batch() {
        let fixture = DatasetFixture::new()
            .with_complete_session("A", None)
            .with_diffusion("B", None);

        let err = composer(&fixture, &["A", "B"]).compose().unwrap_err();
        match err {
            TractifyError::NoStructuralImage { subject } => assert_eq!(subject, "B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_structural_skipped_under_skip_policy() {
        let fixture = DatasetFixture::new()
            .with_complete_session("A", None)
            .with_diffusion("B", None);
        let params = sample_parameters(&["A", "B"], &fixture)
            .with_failure_policy(SubjectFailurePolicy::Skip);

        let composed = BatchGraphComposer::new(params, fixture.source())
            .compose_with_report()
            .unwrap();

        assert_eq!(composed.graph.node_names(), vec!["single_subject_A_wf"]);
        assert_eq!(composed.report.assembled_subjects, vec!["A".to_string()]);
        assert_eq!(composed.report.skipped_subjects.len(), 1);
        assert_eq!(composed.report.skipped_subjects[0].subject, "B");
        assert_eq!(composed.report.skipped_subjects[0].error_kind, "NoStructuralImage");
    }

    #[test]
    fn test_two_sessions_one_missing_diffusion() {
        let fixture = DatasetFixture::new()
            .with_complete_session("01", Some("pre"))
            .with_structural("01", Some("post"))
            .with_file(
                "/bids/derivatives/preproc/sub-01/ses-post/dwi/sub-01_ses-post_dwi.bvec",
                QueryScope::Derivatives,
            );

        let builder_params = sample_parameters(&["01"], &fixture);
        let source = fixture.source();
        let factory = TractographyStages::new();
        let assembly = SubjectGraphBuilder::new(&builder_params, &source, &factory)
            .build("01")
            .unwrap();

        assert_eq!(assembly.graph.node_count(), 1);
        assert_eq!(assembly.sessions, vec!["pre".to_string()]);
        assert_eq!(assembly.skipped.len(), 1);
    }

    #[test]
    fn test_second_structural_run_in_session_is_skipped() {
        let fixture = DatasetFixture::new()
            .with_complete_session("01", Some("a"))
            .with_file(
                "/bids/sub-01/ses-a/anat/sub-01_ses-a_run-2_T1w.nii.gz",
                QueryScope::Raw,
            )
            .with_complete_session("02", None);
        let params = sample_parameters(&["01", "02"], &fixture)
            .with_failure_policy(SubjectFailurePolicy::Skip);

        let composed = BatchGraphComposer::new(params, fixture.source())
            .compose_with_report()
            .unwrap();

        assert_eq!(
            composed.graph.node_names(),
            vec!["single_subject_01_wf", "single_subject_02_wf"]
        );
        assert_eq!(
            subject(&composed.graph, "01").node_names(),
            vec!["sub_01_ses_a_preproc_wf"]
        );
        let tract = session(&composed.graph, "01", "a").node(TRACT_STAGE).unwrap();
        assert_eq!(
            tract.input("inputnode.t1_file"),
            Some(&PortValue::from(PathBuf::from(
                "/bids/sub-01/ses-a/anat/sub-01_ses-a_T1w.nii.gz"
            )))
        );

        let skipped = &composed.report.skipped_sessions;
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].subject, "01");
        assert_eq!(skipped[0].session.as_deref(), Some("a"));
        assert_eq!(skipped[0].error_kind, "InvalidSession");
        assert!(composed.report.skipped_subjects.is_empty());
    }

    #[test]
    fn test_dotted_sidecar_session_is_skipped() {
        let fixture = DatasetFixture::new()
            .with_complete_session("01", None)
            .with_complete_session("02", None);
        let mut layout = fixture.layout();
        let mut sidecar = Metadata::new();
        sidecar.insert("session".to_string(), serde_json::json!("ses-1.5"));
        layout.set_metadata("/bids/sub-01/anat/sub-01_T1w.nii.gz", sidecar);

        let composed = BatchGraphComposer::new(
            sample_parameters(&["01", "02"], &fixture),
            InputSource::discovered(layout),
        )
        .compose_with_report()
        .unwrap();

        assert!(subject(&composed.graph, "01").is_empty());
        assert_eq!(
            subject(&composed.graph, "02").node_names(),
            vec!["sub_02_ses_01_preproc_wf"]
        );
        let skipped = &composed.report.skipped_sessions;
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].session.as_deref(), Some("1.5"));
        assert_eq!(skipped[0].error_kind, "InvalidSession");
    }

    #[test]
    fn test_composition_is_idempotent_and_independent() {
        let fixture = DatasetFixture::new()
            .with_complete_session("01", Some("a"))
            .with_complete_session("02", Some("a"));
        let composer = composer(&fixture, &["01", "02"]);

        let mut first = composer.compose().unwrap();
        let second = composer.compose().unwrap();
        assert_eq!(first.summary(), second.summary());
        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());

        first
            .node_mut(&subject_graph_name("01"))
            .and_then(Node::as_graph_mut)
            .and_then(|g| g.node_mut(&session_graph_name("01", "a")))
            .and_then(Node::as_graph_mut)
            .and_then(|g| g.node_mut(TRACT_STAGE))
            .unwrap()
            .set_input("inputnode.num_tracts", 1_u64)
            .unwrap();

        assert_ne!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
        assert_eq!(
            session(&second, "01", "a")
                .node(TRACT_STAGE)
                .unwrap()
                .input("inputnode.num_tracts"),
            Some(&PortValue::Integer(10_000))
        );
    }

    #[test]
    fn test_each_session_gets_fresh_stage_instances() {
        let fixture = DatasetFixture::new()
            .with_complete_session("01", Some("a"))
            .with_complete_session("01", Some("b"))
            .with_complete_session("02", None);
        let factory = CountingStages::new();

        composer(&fixture, &["01", "02"])
            .with_factory(factory.clone())
            .compose()
            .unwrap();

        assert_eq!(factory.tractography_count(), 3);
        assert_eq!(factory.writer_count(), 3);
    }

    #[test]
    fn test_port_mismatch_is_fatal() {
        let fixture = DatasetFixture::new().with_complete_session("01", None);
        let params = sample_parameters(&["01"], &fixture)
            .with_failure_policy(SubjectFailurePolicy::Skip);

        let err = BatchGraphComposer::new(params, fixture.source())
            .with_factory(Arc::new(MisdeclaredStages::without_output(ports::GMWMI_FILE)))
            .compose()
            .unwrap_err();

        match err {
            TractifyError::PortMismatch(e) => {
                assert_eq!(e.node, TRACT_STAGE);
                assert_eq!(e.port, "outputnode.gmwmi_file");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tractography_only_variant() {
        let fixture = DatasetFixture::new().with_complete_session("01", None);
        let params = sample_parameters(&["01"], &fixture)
            .with_variant(PipelineVariant::TractographyOnly);
        let factory = CountingStages::new();

        let batch = BatchGraphComposer::new(params, fixture.source())
            .with_factory(factory.clone())
            .compose()
            .unwrap();

        assert_eq!(session(&batch, "01", "01").node_names(), vec![TRACT_STAGE]);
        assert_eq!(factory.writer_count(), 0);
    }

    #[test]
    fn test_enumerated_files_for_every_subject() {
        let files = SessionFiles {
            session_id: Some("baseline".to_string()),
            t1_file: Some(PathBuf::from("/in/t1.nii.gz")),
            eddy_file: Some(PathBuf::from("/in/eddy.nii.gz")),
            bvec_file: Some(PathBuf::from("/in/dwi.bvec")),
            bval_file: Some(PathBuf::from("/in/dwi.bval")),
            eddy_mask: Some(PathBuf::from("/in/mask.nii.gz")),
            ..SessionFiles::default()
        };
        let params = BatchParameters::new(["sub-01", "sub-02"], "/w", "/o", "/t", "/a")
            .with_session_files(files);

        let batch = BatchGraphComposer::from_parameters(params)
            .unwrap()
            .compose()
            .unwrap();

        for id in ["01", "02"] {
            let tract = session(&batch, id, "baseline").node(TRACT_STAGE).unwrap();
            assert_eq!(tract.input("inputnode.subject_id"), Some(&PortValue::from(id)));
            assert_eq!(
                tract.input("inputnode.eddy_mask"),
                Some(&PortValue::from(PathBuf::from("/in/mask.nii.gz")))
            );
        }
    }

    #[tokio::test]
    async fn test_scanned_dataset_to_plan() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = DatasetFixture::at(
            dir.path().join("bids"),
            dir.path().join("bids/derivatives/preproc"),
        )
        .with_complete_session("01", Some("a"))
        .with_complete_session("01", Some("b"))
        .with_structural("02", None);
        fixture.materialize().unwrap();

        let params = sample_parameters(&["01", "02"], &fixture)
            .with_failure_policy(SubjectFailurePolicy::Skip);
        let composed = BatchGraphComposer::from_parameters(params)
            .unwrap()
            .compose_with_report()
            .unwrap();

        assert_eq!(composed.report.session_count, 2);
        assert_eq!(composed.report.skipped_sessions.len(), 1);
        assert_eq!(composed.report.skipped_sessions[0].subject, "02");
        assert!(composed.report.has_skips());

        let summary = PlanOnlyEngine::new().run(&composed.graph).await.unwrap();
        assert_eq!(summary.nodes_planned, 10);

        let recorder = RecordingEngine::new();
        recorder.run(&composed.graph).await.unwrap();
        let plan = &recorder.recorded_plans()[0];
        let datasink = plan
            .steps
            .iter()
            .find(|s| s.path == "single_subject_01_wf.sub_01_ses_a_preproc_wf.tract_output_wf.datasink")
            .unwrap();
        assert_eq!(
            datasink.upstream,
            vec!["single_subject_01_wf.sub_01_ses_a_preproc_wf.tract_output_wf.inputnode".to_string()]
        );
    }
}
