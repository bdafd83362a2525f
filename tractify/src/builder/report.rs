//! Records of what assembly skipped.

use crate::errors::TractifyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subject or session left out of the assembled graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    /// Subject identifier.
    pub subject: String,
    /// Session identifier, for session-level skips.
    pub session: Option<String>,
    /// Error message.
    pub reason: String,
    /// Error kind name.
    pub error_kind: String,
    /// When the skip was recorded.
    pub timestamp: DateTime<Utc>,
}

impl SkipRecord {
    /// Records a skipped session.
    #[must_use]
    pub fn session(subject: &str, session: &str, err: &TractifyError) -> Self {
        Self {
            subject: subject.to_string(),
            session: Some(session.to_string()),
            reason: err.to_string(),
            error_kind: err.kind().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Records a skipped subject.
    #[must_use]
    pub fn subject(subject: &str, err: &TractifyError) -> Self {
        Self {
            subject: subject.to_string(),
            session: None,
            reason: err.to_string(),
            error_kind: err.kind().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one batch assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// Unique id of this build.
    pub build_id: Uuid,
    /// When the build started.
    pub built_at: DateTime<Utc>,
    /// Subjects present in the graph, in order.
    pub assembled_subjects: Vec<String>,
    /// Number of session pipelines in the graph.
    pub session_count: usize,
    /// Subjects left out.
    pub skipped_subjects: Vec<SkipRecord>,
    /// Sessions left out.
    pub skipped_sessions: Vec<SkipRecord>,
    /// Wall-clock assembly time in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
}

impl AssemblyReport {
    /// Starts a report for a new build.
    #[must_use]
    pub fn new() -> Self {
        Self {
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            assembled_subjects: Vec::new(),
            session_count: 0,
            skipped_subjects: Vec::new(),
            skipped_sessions: Vec::new(),
            duration_ms: 0.0,
        }
    }

    /// Returns true if anything was left out.
    #[must_use]
    pub fn has_skips(&self) -> bool {
        !self.skipped_subjects.is_empty() || !self.skipped_sessions.is_empty()
    }
}

impl Default for AssemblyReport {
    fn default() -> Self {
        Self::new()
    }
}
