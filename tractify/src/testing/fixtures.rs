//! Dataset and parameter fixtures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::BatchParameters;
use crate::discovery::{DatasetLayout, QueryScope};
use crate::resolver::InputSource;

/// Builds small BIDS-style datasets in memory or on disk.
#[derive(Debug, Clone)]
pub struct DatasetFixture {
    raw_root: PathBuf,
    derivatives_root: PathBuf,
    files: Vec<(PathBuf, QueryScope)>,
}

impl Default for DatasetFixture {
    fn default() -> Self {
        Self::at("/bids", "/bids/derivatives/preproc")
    }
}

impl DatasetFixture {
    /// Creates an empty fixture rooted at `/bids`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty fixture with explicit roots.
    #[must_use]
    pub fn at(raw_root: impl Into<PathBuf>, derivatives_root: impl Into<PathBuf>) -> Self {
        Self {
            raw_root: raw_root.into(),
            derivatives_root: derivatives_root.into(),
            files: Vec::new(),
        }
    }

    /// Raw dataset root.
    #[must_use]
    pub fn raw_root(&self) -> &Path {
        &self.raw_root
    }

    /// Derivatives root.
    #[must_use]
    pub fn derivatives_root(&self) -> &Path {
        &self.derivatives_root
    }

    /// Adds a raw T1-weighted image.
    #[must_use]
    pub fn with_structural(mut self, subject: &str, session: Option<&str>) -> Self {
        let path = self.raw_root.join(entity_path(subject, session, "anat", "T1w.nii.gz"));
        self.files.push((path, QueryScope::Raw));
        self
    }

    /// Adds a post-processed diffusion image with its gradient files.
    #[must_use]
    pub fn with_diffusion(mut self, subject: &str, session: Option<&str>) -> Self {
        for ext in ["dwi.nii.gz", "dwi.bvec", "dwi.bval"] {
            let path = self
                .derivatives_root
                .join(entity_path(subject, session, "dwi", ext));
            self.files.push((path, QueryScope::Derivatives));
        }
        self
    }

    /// Adds a session with every required input.
    #[must_use]
    pub fn with_complete_session(self, subject: &str, session: Option<&str>) -> Self {
        self.with_structural(subject, session)
            .with_diffusion(subject, session)
    }

    /// Adds an arbitrary file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, scope: QueryScope) -> Self {
        self.files.push((path.into(), scope));
        self
    }

    /// Every file in the fixture.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|(p, _)| p.as_path())
    }

    /// In-memory layout of the fixture.
    #[must_use]
    pub fn layout(&self) -> DatasetLayout {
        let mut layout = DatasetLayout::new();
        for (path, scope) in &self.files {
            layout.add_file(path.clone(), *scope);
        }
        layout
    }

    /// Input source backed by [`DatasetFixture::layout`].
    #[must_use]
    pub fn source(&self) -> InputSource {
        InputSource::discovered(self.layout())
    }

    /// Creates every file as an empty file on disk.
    ///
    /// # Errors
    ///
    /// Returns any IO error from creating directories or files.
    pub fn materialize(&self) -> io::Result<()> {
        fs::create_dir_all(&self.raw_root)?;
        fs::create_dir_all(&self.derivatives_root)?;
        for path in self.paths() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, b"")?;
        }
        Ok(())
    }
}

/// `sub-<s>[/ses-<x>]/<datatype>/sub-<s>[_ses-<x>]_<tail>`
fn entity_path(subject: &str, session: Option<&str>, datatype: &str, tail: &str) -> PathBuf {
    let mut dir = PathBuf::from(format!("sub-{subject}"));
    let mut stem = format!("sub-{subject}");
    if let Some(ses) = session {
        dir.push(format!("ses-{ses}"));
        stem = format!("{stem}_ses-{ses}");
    }
    dir.join(datatype).join(format!("{stem}_{tail}"))
}

/// Parameters for `subjects` reading from `fixture`, with small defaults.
#[must_use]
pub fn sample_parameters(subjects: &[&str], fixture: &DatasetFixture) -> BatchParameters {
    let mut params = BatchParameters::new(
        subjects.iter().copied(),
        "/work",
        "/out",
        "/templates/mni_1mm.nii.gz",
        "/templates/shen_268.nii.gz",
    )
    .with_bids_dir(fixture.raw_root())
    .with_num_tracts(10_000);
    params.derivatives_dirs = vec![fixture.derivatives_root().to_path_buf()];
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{FileQuery, Layout};

    #[test]
    fn test_entity_paths() {
        assert_eq!(
            entity_path("01", Some("a"), "anat", "T1w.nii.gz"),
            PathBuf::from("sub-01/ses-a/anat/sub-01_ses-a_T1w.nii.gz")
        );
        assert_eq!(
            entity_path("01", None, "dwi", "dwi.bval"),
            PathBuf::from("sub-01/dwi/sub-01_dwi.bval")
        );
    }

    #[test]
    fn test_layout_answers_queries() {
        let fixture = DatasetFixture::new().with_complete_session("01", Some("a"));
        let layout = fixture.layout();
        assert_eq!(layout.len(), 4);

        let query = FileQuery::new("01", "dwi")
            .with_session("a")
            .with_extensions(&[".bvec"])
            .in_scope(QueryScope::Derivatives);
        assert_eq!(layout.get(&query).len(), 1);
    }

    #[test]
    fn test_materialize_then_scan() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = DatasetFixture::at(dir.path().join("bids"), dir.path().join("preproc"))
            .with_complete_session("01", None);
        fixture.materialize().unwrap();

        let scanned = DatasetLayout::scan(
            fixture.raw_root(),
            &[fixture.derivatives_root().to_path_buf()],
        )
        .unwrap();
        assert_eq!(scanned.len(), 4);
        assert_eq!(scanned.subjects(), vec!["01".to_string()]);
    }
}
