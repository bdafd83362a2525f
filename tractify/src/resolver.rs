//! Port binding resolution for one session pipeline.
//!
//! Inputs come from an [`InputSource`]: either a discovery [`Layout`] or
//! explicitly enumerated files. Both feed the same resolver, so the rest of
//! the assembly never cares how a file was found.

use crate::config::{BatchParameters, SessionFiles};
use crate::discovery::{DatasetLayout, FileQuery, Layout, QueryScope};
use crate::errors::{MissingInputError, TractifyError};
use crate::graph::{Node, PortValue};
use crate::stages::ports;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Session assigned when the dataset has no session axis.
pub const DEFAULT_SESSION: &str = "01";

const STRUCTURAL_SUFFIX: &str = "T1w";
const DIFFUSION_SUFFIX: &str = "dwi";
const NIFTI_EXTENSIONS: &[&str] = &[".nii.gz", ".nii"];

/// Where session inputs come from.
#[derive(Clone)]
pub enum InputSource {
    /// Query a dataset layout per subject and session.
    Discovered(Arc<dyn Layout>),
    /// Use the same explicit files for every subject.
    Enumerated(SessionFiles),
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered(_) => f.debug_tuple("Discovered").field(&"<layout>").finish(),
            Self::Enumerated(files) => f.debug_tuple("Enumerated").field(files).finish(),
        }
    }
}

impl InputSource {
    /// Wraps a layout.
    #[must_use]
    pub fn discovered(layout: impl Layout + 'static) -> Self {
        Self::Discovered(Arc::new(layout))
    }

    /// Chooses the source described by the parameters.
    ///
    /// Explicit session files win; otherwise `bids_dir` and
    /// `derivatives_dirs` are scanned.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither is set, or a discovery
    /// error if scanning fails.
    pub fn from_parameters(params: &BatchParameters) -> Result<Self, TractifyError> {
        if let Some(files) = &params.session_files {
            return Ok(Self::Enumerated(files.clone()));
        }
        let Some(bids_dir) = &params.bids_dir else {
            return Err(TractifyError::Config(
                "Either bids_dir or session_files must be provided".to_string(),
            ));
        };
        let layout = DatasetLayout::scan(bids_dir, &params.derivatives_dirs)?;
        for subject in absent_subjects(&layout, &params.subject_list) {
            warn!(
                subject = %subject,
                bids_dir = %bids_dir.display(),
                "Subject not found in dataset"
            );
        }
        Ok(Self::discovered(layout))
    }
}

/// One structural image and the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCandidate {
    /// Session identifier.
    pub session_id: String,
    /// Structural image path.
    pub structural: PathBuf,
}

/// Resolved port values for one session pipeline, ordered by port name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortBindings {
    values: BTreeMap<String, PortValue>,
}

impl PortBindings {
    fn bind(&mut self, port: &str, value: impl Into<PortValue>) {
        self.values.insert(port.to_string(), value.into());
    }

    /// Returns the value bound to `port`.
    #[must_use]
    pub fn get(&self, port: &str) -> Option<&PortValue> {
        self.values.get(port)
    }

    /// Returns true if `port` is bound.
    #[must_use]
    pub fn contains(&self, port: &str) -> bool {
        self.values.contains_key(port)
    }

    /// Number of bound ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over bindings in port-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PortValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sets every binding on `node`.
    ///
    /// # Errors
    ///
    /// Returns `PortMismatch` if the node does not declare a bound port.
    pub fn apply_to(&self, node: &mut Node) -> Result<(), TractifyError> {
        for (port, value) in &self.values {
            node.set_input(port, value.clone())?;
        }
        Ok(())
    }
}

/// Resolves the tractography inputs of a session.
#[derive(Debug, Clone, Copy)]
pub struct PortBindingResolver<'a> {
    params: &'a BatchParameters,
    source: &'a InputSource,
}

impl<'a> PortBindingResolver<'a> {
    /// Creates a resolver over static parameters and an input source.
    #[must_use]
    pub const fn new(params: &'a BatchParameters, source: &'a InputSource) -> Self {
        Self { params, source }
    }

    /// Lists the structural images of a subject, one per session.
    ///
    /// # Errors
    ///
    /// Returns `NoStructuralImage` if the subject has none.
    pub fn structural_candidates(
        &self,
        subject_id: &str,
    ) -> Result<Vec<SessionCandidate>, TractifyError> {
        let candidates: Vec<SessionCandidate> = match self.source {
            InputSource::Discovered(layout) => {
                let query = FileQuery::new(subject_id, STRUCTURAL_SUFFIX)
                    .with_extensions(NIFTI_EXTENSIONS)
                    .in_scope(QueryScope::Raw);
                layout
                    .get(&query)
                    .into_iter()
                    .map(|structural| SessionCandidate {
                        session_id: infer_session(layout.as_ref(), &structural),
                        structural,
                    })
                    .collect()
            }
            InputSource::Enumerated(files) => files
                .t1_file
                .iter()
                .map(|t1| SessionCandidate {
                    session_id: files
                        .session_id
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SESSION.to_string()),
                    structural: t1.clone(),
                })
                .collect(),
        };

        if candidates.is_empty() {
            return Err(TractifyError::no_structural_image(subject_id));
        }
        Ok(candidates)
    }

    /// Resolves every input port for one session.
    ///
    /// # Errors
    ///
    /// Returns `MissingRequiredInput` naming the first required port that
    /// could not be bound. Optional ports never fail.
    pub fn resolve(
        &self,
        subject_id: &str,
        candidate: &SessionCandidate,
    ) -> Result<PortBindings, TractifyError> {
        let session_id = candidate.session_id.as_str();
        let diffusion = self.diffusion_files(subject_id, session_id);
        let missing = |port: &str| MissingInputError::new(subject_id, session_id, port);

        let mut bindings = PortBindings::default();
        bindings.bind(ports::SUBJECT_ID, subject_id);
        bindings.bind(ports::SESSION_ID, session_id);
        bindings.bind(ports::OUTPUT_DIR, self.params.output_dir.as_path());
        bindings.bind(ports::T1_FILE, candidate.structural.as_path());
        bindings.bind(ports::EDDY_FILE, diffusion.eddy_file.ok_or_else(|| missing(ports::EDDY_FILE))?);
        bindings.bind(ports::BVEC, diffusion.bvec_file.ok_or_else(|| missing(ports::BVEC))?);
        bindings.bind(ports::BVAL, diffusion.bval_file.ok_or_else(|| missing(ports::BVAL))?);
        bindings.bind(ports::TEMPLATE, self.params.template_file.as_path());
        bindings.bind(ports::ATLAS, self.params.atlas_file.as_path());
        bindings.bind(ports::NUM_TRACTS, self.params.num_tracts);

        if let Some(avg_b0) = diffusion.eddy_avg_b0 {
            bindings.bind(ports::EDDY_AVG_B0, avg_b0);
        }
        if let Some(mask) = diffusion.eddy_mask {
            bindings.bind(ports::EDDY_MASK, mask);
        }

        debug!(
            subject = subject_id,
            session = session_id,
            bound = bindings.len(),
            "Resolved session inputs"
        );
        Ok(bindings)
    }

    fn diffusion_files(&self, subject_id: &str, session_id: &str) -> SessionFiles {
        match self.source {
            InputSource::Enumerated(files) => files.clone(),
            InputSource::Discovered(layout) => {
                let lookup = |suffix: &str, extensions: &[&str]| {
                    let query = FileQuery::new(subject_id, suffix)
                        .with_session(session_id)
                        .with_extensions(extensions)
                        .in_scope(QueryScope::Derivatives);
                    first_match(layout.as_ref(), &query)
                };
                SessionFiles {
                    session_id: Some(session_id.to_string()),
                    t1_file: None,
                    eddy_file: lookup(DIFFUSION_SUFFIX, NIFTI_EXTENSIONS),
                    bvec_file: lookup(DIFFUSION_SUFFIX, &[".bvec"]),
                    bval_file: lookup(DIFFUSION_SUFFIX, &[".bval"]),
                    eddy_avg_b0: lookup("dwiref", NIFTI_EXTENSIONS),
                    eddy_mask: lookup("mask", NIFTI_EXTENSIONS),
                }
            }
        }
    }
}

fn first_match(layout: &dyn Layout, query: &FileQuery) -> Option<PathBuf> {
    let mut found = layout.get(query);
    found.sort();
    if found.len() > 1 {
        debug!(
            subject = %query.subject,
            suffix = %query.suffix,
            matches = found.len(),
            "Several files match, using the first"
        );
    }
    found.into_iter().next()
}

/// Session of a structural image: filename entity, then sidecar
/// `session` key, then [`DEFAULT_SESSION`].
fn absent_subjects<'s>(layout: &DatasetLayout, subjects: &'s [String]) -> Vec<&'s str> {
    let present = layout.subjects();
    subjects
        .iter()
        .filter(|s| !present.contains(*s))
        .map(String::as_str)
        .collect()
}

fn infer_session(layout: &dyn Layout, path: &Path) -> String {
    if let Some(session) = layout.parse_file_entities(path).remove("session") {
        return session;
    }
    layout
        .get_metadata(path)
        .get("session")
        .and_then(serde_json::Value::as_str)
        .map(|s| s.strip_prefix("ses-").unwrap_or(s).to_string())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}
