//! Indexed dataset layout.

use super::{parse_entities, Entities, FileQuery, Layout, Metadata, QueryScope};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct IndexedFile {
    path: PathBuf,
    scope: QueryScope,
    entities: Entities,
}

/// A dataset index answering [`Layout`] queries from memory.
///
/// Build it by hand with [`DatasetLayout::add_file`] or from disk with
/// [`DatasetLayout::scan`].
#[derive(Debug, Clone, Default)]
pub struct DatasetLayout {
    files: Vec<IndexedFile>,
    metadata: HashMap<PathBuf, Metadata>,
}

impl DatasetLayout {
    /// Creates an empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a file; entities are parsed from its name.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, scope: QueryScope) {
        let path = path.into();
        let entities = parse_entities(&path);
        self.files.push(IndexedFile {
            path,
            scope,
            entities,
        });
    }

    /// Builder variant of [`DatasetLayout::add_file`].
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, scope: QueryScope) -> Self {
        self.add_file(path, scope);
        self
    }

    /// Attaches sidecar metadata to a file.
    pub fn set_metadata(&mut self, path: impl Into<PathBuf>, metadata: Metadata) {
        self.metadata.insert(path.into(), metadata);
    }

    /// Returns the number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Subject identifiers present in the index, sorted.
    #[must_use]
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .files
            .iter()
            .filter_map(|f| f.entities.get("subject").cloned())
            .collect();
        subjects.sort();
        subjects.dedup();
        subjects
    }
}

impl Layout for DatasetLayout {
    fn get(&self, query: &FileQuery) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|f| query.matches(&f.entities, f.scope))
            .map(|f| f.path.clone())
            .collect();
        found.sort();
        found.dedup();
        found
    }

    fn get_metadata(&self, path: &Path) -> Metadata {
        self.metadata.get(path).cloned().unwrap_or_default()
    }

    fn parse_file_entities(&self, path: &Path) -> Entities {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map_or_else(|| parse_entities(path), |f| f.entities.clone())
    }
}
