//! Execution policy carried by every node of an assembled graph.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the output directory that collects crash reports.
pub const CRASH_DIR_NAME: &str = "tractify_crash";

/// Format of crash reports written by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashFileFormat {
    /// Compressed pickle-compatible dump.
    #[default]
    Pklz,
    /// Plain text report.
    Txt,
}

/// Resource limits applied by the execution engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of concurrent processes.
    #[serde(default)]
    pub n_procs: Option<usize>,
    /// Memory ceiling in gigabytes.
    #[serde(default)]
    pub memory_gb: Option<f64>,
}

/// Execution configuration propagated onto every node after assembly.
///
/// Policies are plain values: each node owns its own copy, so changing
/// one node's policy never affects another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Where the engine writes crash reports for failing nodes.
    pub crashdump_dir: PathBuf,
    /// Crash report format.
    #[serde(default)]
    pub crashfile_format: CrashFileFormat,
    /// Whether the engine stops at the first failing node.
    #[serde(default)]
    pub stop_on_first_crash: bool,
    /// Resource limits.
    #[serde(default)]
    pub resources: ResourceLimits,
}

impl ExecutionPolicy {
    /// Creates a policy writing crash reports to `crashdump_dir`.
    #[must_use]
    pub fn new(crashdump_dir: impl Into<PathBuf>) -> Self {
        Self {
            crashdump_dir: crashdump_dir.into(),
            crashfile_format: CrashFileFormat::default(),
            stop_on_first_crash: false,
            resources: ResourceLimits::default(),
        }
    }

    /// Batch-level policy: `<output_dir>/tractify_crash`.
    #[must_use]
    pub fn for_batch(output_dir: &Path) -> Self {
        Self::new(output_dir.join(CRASH_DIR_NAME))
    }

    /// Returns a copy of this policy scoped to one subject.
    ///
    /// The crash directory becomes `<output_dir>/tractify_crash/sub-<id>/log`.
    #[must_use]
    pub fn for_subject(&self, output_dir: &Path, subject_id: &str) -> Self {
        Self {
            crashdump_dir: subject_crash_dir(output_dir, subject_id),
            ..self.clone()
        }
    }

    /// Sets the crash file format.
    #[must_use]
    pub const fn with_crashfile_format(mut self, format: CrashFileFormat) -> Self {
        self.crashfile_format = format;
        self
    }

    /// Sets the stop-on-first-crash flag.
    #[must_use]
    pub const fn with_stop_on_first_crash(mut self, stop: bool) -> Self {
        self.stop_on_first_crash = stop;
        self
    }

    /// Sets the resource limits.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourceLimits) -> Self {
        self.resources = resources;
        self
    }
}

/// Crash log directory for one subject.
#[must_use]
pub fn subject_crash_dir(output_dir: &Path, subject_id: &str) -> PathBuf {
    output_dir
        .join(CRASH_DIR_NAME)
        .join(format!("sub-{subject_id}"))
        .join("log")
}

/// What the batch composer does when a subject has no structural image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectFailurePolicy {
    /// Abort the whole batch (default).
    #[default]
    Abort,
    /// Drop the subject and keep assembling the rest.
    Skip,
}
