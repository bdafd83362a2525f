//! Filesystem scanning for [`DatasetLayout`].

use super::{split_extension, DatasetLayout, Metadata, QueryScope};
use crate::errors::TractifyError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Top-level directories of a raw dataset that never hold acquisitions.
const SKIPPED_DIRS: &[&str] = &["derivatives", "sourcedata", "code"];

/// Image extensions that may carry a JSON sidecar.
const IMAGE_EXTENSIONS: &[&str] = &[".nii", ".nii.gz"];

impl DatasetLayout {
    /// Indexes a raw dataset and any number of derivative trees.
    ///
    /// Only files whose name starts with `sub-` are indexed. JSON sidecars
    /// next to images are loaded as metadata; unreadable sidecars are
    /// logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns a discovery error if a root is not a directory or cannot be read.
    pub fn scan(raw_root: &Path, derivative_roots: &[PathBuf]) -> Result<Self, TractifyError> {
        let mut layout = Self::new();
        layout.scan_root(raw_root, QueryScope::Raw)?;
        for root in derivative_roots {
            layout.scan_root(root, QueryScope::Derivatives)?;
        }
        debug!(
            raw_root = %raw_root.display(),
            files = layout.len(),
            "Indexed dataset"
        );
        Ok(layout)
    }

    fn scan_root(&mut self, root: &Path, scope: QueryScope) -> Result<(), TractifyError> {
        if !root.is_dir() {
            return Err(TractifyError::Discovery(format!(
                "Dataset root '{}' is not a directory",
                root.display()
            )));
        }
        let mut files = collect_files(root).map_err(|e| {
            TractifyError::Discovery(format!("Failed to scan '{}': {e}", root.display()))
        })?;
        files.sort();

        for path in files {
            if let Some(metadata) = read_sidecar(&path) {
                self.set_metadata(&path, metadata);
            }
            self.add_file(path, scope);
        }
        Ok(())
    }
}

fn collect_files(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            let skipped = entry.depth() == 1
                && entry.file_type().is_dir()
                && SKIPPED_DIRS.contains(&name.as_ref());
            entry.depth() == 0 || !(name.starts_with('.') || skipped)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        let indexed = entry.file_name().to_string_lossy().starts_with("sub-");
        if indexed && entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_sidecar(path: &Path) -> Option<Metadata> {
    let file_name = path.file_name()?.to_str()?;
    let (stem, extension) = split_extension(file_name);
    if !IMAGE_EXTENSIONS.contains(&extension) {
        return None;
    }

    let sidecar = path.with_file_name(format!("{stem}.json"));
    let text = fs::read_to_string(&sidecar).ok()?;
    match serde_json::from_str::<Metadata>(&text) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!(sidecar = %sidecar.display(), error = %e, "Ignoring unreadable sidecar");
            None
        }
    }
}
