//! Batch parameters.

use crate::errors::TractifyError;
use crate::policy::{CrashFileFormat, ExecutionPolicy, ResourceLimits, SubjectFailurePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which stages each session pipeline contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    /// Tractography followed by the output writer.
    #[default]
    Full,
    /// Tractography only.
    TractographyOnly,
}

/// Explicit per-session input files for the single-session mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFiles {
    /// Session identifier; `"01"` when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Structural (T1-weighted) image.
    #[serde(default)]
    pub t1_file: Option<PathBuf>,
    /// Post-processed (eddy-corrected) diffusion image.
    #[serde(default)]
    pub eddy_file: Option<PathBuf>,
    /// Gradient vectors.
    #[serde(default)]
    pub bvec_file: Option<PathBuf>,
    /// Gradient values.
    #[serde(default)]
    pub bval_file: Option<PathBuf>,
    /// Averaged b0 reference volume.
    #[serde(default)]
    pub eddy_avg_b0: Option<PathBuf>,
    /// Brain mask in diffusion space.
    #[serde(default)]
    pub eddy_mask: Option<PathBuf>,
}

/// Static parameters of one batch build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchParameters {
    /// Subjects to process, in order. A leading `sub-` is stripped.
    pub subject_list: Vec<String>,
    /// Working directory handed to the engine.
    pub work_dir: PathBuf,
    /// Output directory.
    pub output_dir: PathBuf,
    /// Template image.
    pub template_file: PathBuf,
    /// Parcellation atlas.
    pub atlas_file: PathBuf,
    /// Number of streamlines to generate.
    #[serde(default = "default_num_tracts")]
    pub num_tracts: u64,
    /// Session pipeline variant.
    #[serde(default)]
    pub variant: PipelineVariant,
    /// Behaviour when a subject has no structural image.
    #[serde(default)]
    pub on_missing_structural: SubjectFailurePolicy,
    /// Raw dataset root for discovery.
    #[serde(default)]
    pub bids_dir: Option<PathBuf>,
    /// Derivative trees searched for post-processed diffusion data.
    #[serde(default)]
    pub derivatives_dirs: Vec<PathBuf>,
    /// Explicit files; takes precedence over discovery.
    #[serde(default)]
    pub session_files: Option<SessionFiles>,
    /// Crash report format.
    #[serde(default)]
    pub crashfile_format: CrashFileFormat,
    /// Stop the engine at the first failing node.
    #[serde(default)]
    pub stop_on_first_crash: bool,
    /// Engine resource limits.
    #[serde(default)]
    pub resources: ResourceLimits,
}

fn default_num_tracts() -> u64 {
    1_000_000
}

impl BatchParameters {
    /// Creates parameters with defaults for every optional field.
    #[must_use]
    pub fn new(
        subject_list: impl IntoIterator<Item = impl Into<String>>,
        work_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        template_file: impl Into<PathBuf>,
        atlas_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            subject_list: subject_list
                .into_iter()
                .map(|s| normalize_subject(&s.into()))
                .collect(),
            work_dir: work_dir.into(),
            output_dir: output_dir.into(),
            template_file: template_file.into(),
            atlas_file: atlas_file.into(),
            num_tracts: default_num_tracts(),
            variant: PipelineVariant::default(),
            on_missing_structural: SubjectFailurePolicy::default(),
            bids_dir: None,
            derivatives_dirs: Vec::new(),
            session_files: None,
            crashfile_format: CrashFileFormat::default(),
            stop_on_first_crash: false,
            resources: ResourceLimits::default(),
        }
    }

    /// Parses parameters from JSON and validates them.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if parsing or validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, TractifyError> {
        let mut params: Self = serde_json::from_str(json)
            .map_err(|e| TractifyError::Config(format!("Invalid batch parameters: {e}")))?;
        params.subject_list = params
            .subject_list
            .iter()
            .map(|s| normalize_subject(s))
            .collect();
        params.validate()?;
        Ok(params)
    }

    /// Reads parameters from a JSON file and validates them.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or a configuration
    /// error if it is invalid.
    pub fn from_json_file(path: &Path) -> Result<Self, TractifyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks the parameters before any graph is built.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<(), TractifyError> {
        if let Some(bad) = self.subject_list.iter().find(|s| s.trim().is_empty()) {
            return Err(TractifyError::Config(format!(
                "Subject identifiers cannot be empty (got '{bad}')"
            )));
        }
        if self.num_tracts == 0 {
            return Err(TractifyError::Config(
                "num_tracts must be greater than zero".to_string(),
            ));
        }
        if self.bids_dir.is_none() && self.session_files.is_none() {
            return Err(TractifyError::Config(
                "Either bids_dir or session_files must be provided".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the explicit session files.
    #[must_use]
    pub fn with_session_files(mut self, files: SessionFiles) -> Self {
        self.session_files = Some(files);
        self
    }

    /// Sets the raw dataset root.
    #[must_use]
    pub fn with_bids_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bids_dir = Some(dir.into());
        self
    }

    /// Sets the pipeline variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: PipelineVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the subject failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: SubjectFailurePolicy) -> Self {
        self.on_missing_structural = policy;
        self
    }

    /// Sets the number of streamlines.
    #[must_use]
    pub const fn with_num_tracts(mut self, num_tracts: u64) -> Self {
        self.num_tracts = num_tracts;
        self
    }

    /// Batch-level execution policy derived from these parameters.
    #[must_use]
    pub fn execution_policy(&self) -> ExecutionPolicy {
        ExecutionPolicy::for_batch(&self.output_dir)
            .with_crashfile_format(self.crashfile_format)
            .with_stop_on_first_crash(self.stop_on_first_crash)
            .with_resources(self.resources.clone())
    }
}

/// Strips a leading `sub-` from a subject label.
#[must_use]
pub fn normalize_subject(subject: &str) -> String {
    subject.strip_prefix("sub-").unwrap_or(subject).to_string()
}
