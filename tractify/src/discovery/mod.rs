//! Subject/session discovery.
//!
//! Assembly consumes discovery through the [`Layout`] trait only. An empty
//! query result means "not found"; it is never an error at this level.

mod entities;
mod layout;
mod scan;

pub use entities::{parse_entities, split_extension};
pub use layout::DatasetLayout;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Parsed filename entities (`subject`, `session`, `suffix`, `extension`, ...).
pub type Entities = BTreeMap<String, String>;

/// Sidecar metadata of a file.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Which part of a dataset a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryScope {
    /// Raw acquisitions.
    Raw,
    /// Outputs of earlier processing (e.g. diffusion preprocessing).
    Derivatives,
    /// Either.
    #[default]
    Any,
}

impl QueryScope {
    /// Returns true if a file stored in `stored` is visible to this scope.
    #[must_use]
    pub fn includes(self, stored: Self) -> bool {
        matches!(self, Self::Any) || self == stored
    }
}

/// A file lookup by subject, optional session, suffix and extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileQuery {
    /// Subject identifier, without the `sub-` prefix.
    pub subject: String,
    /// Session identifier; files without a session entity also match.
    pub session: Option<String>,
    /// BIDS suffix, e.g. `T1w` or `dwi`.
    pub suffix: String,
    /// Accepted extensions with leading dot; empty accepts any.
    pub extensions: Vec<String>,
    /// Dataset part to search.
    pub scope: QueryScope,
}

impl FileQuery {
    /// Creates a query for `suffix` files of `subject`.
    #[must_use]
    pub fn new(subject: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            suffix: suffix.into(),
            ..Self::default()
        }
    }

    /// Restricts the query to one session.
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Restricts the accepted extensions.
    #[must_use]
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| (*e).to_string()).collect();
        self
    }

    /// Restricts the dataset part searched.
    #[must_use]
    pub const fn in_scope(mut self, scope: QueryScope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns true if a file with these entities, stored in `stored`, matches.
    #[must_use]
    pub fn matches(&self, entities: &Entities, stored: QueryScope) -> bool {
        let field = |key: &str| entities.get(key).map(String::as_str);

        self.scope.includes(stored)
            && field("subject") == Some(self.subject.as_str())
            && field("suffix") == Some(self.suffix.as_str())
            && match (&self.session, field("session")) {
                (Some(wanted), Some(found)) => wanted == found,
                _ => true,
            }
            && (self.extensions.is_empty()
                || field("extension").is_some_and(|ext| self.extensions.iter().any(|e| e == ext)))
    }
}

/// Query interface over a structured imaging dataset.
#[cfg_attr(test, mockall::automock)]
pub trait Layout: Send + Sync {
    /// Returns the files matching `query`, sorted by path.
    fn get(&self, query: &FileQuery) -> Vec<PathBuf>;

    /// Returns the sidecar metadata of `path` (empty if none).
    fn get_metadata(&self, path: &Path) -> Metadata;

    /// Returns the entities encoded in `path`.
    fn parse_file_entities(&self, path: &Path) -> Entities {
        parse_entities(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_matches_session_less_files() {
        let entities = parse_entities(Path::new("sub-01_dwi.bval"));
        let query = FileQuery::new("01", "dwi")
            .with_session("03")
            .with_extensions(&[".bval"]);
        assert!(query.matches(&entities, QueryScope::Derivatives));
    }

    #[test]
    fn test_query_rejects_other_session() {
        let entities = parse_entities(Path::new("sub-01_ses-02_T1w.nii"));
        let query = FileQuery::new("01", "T1w").with_session("03");
        assert!(!query.matches(&entities, QueryScope::Raw));
    }

    #[test]
    fn test_query_scope_and_extension() {
        let entities = parse_entities(Path::new("sub-01_T1w.json"));
        let query = FileQuery::new("01", "T1w")
            .with_extensions(&[".nii", ".nii.gz"])
            .in_scope(QueryScope::Raw);
        assert!(!query.matches(&entities, QueryScope::Raw));

        let nifti = parse_entities(Path::new("sub-01_T1w.nii.gz"));
        assert!(query.matches(&nifti, QueryScope::Raw));
        assert!(!query.matches(&nifti, QueryScope::Derivatives));
    }
}
