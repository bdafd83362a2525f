//! BIDS-style filename entity parsing.

use super::Entities;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Datatype directories recognised in a dataset tree.
const DATATYPES: &[&str] = &["anat", "dwi", "func", "fmap", "perf"];

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^(?P<key>[A-Za-z]+)-(?P<value>[A-Za-z0-9]+)$").unwrap()
    })
}

fn long_key(key: &str) -> &str {
    match key {
        "sub" => "subject",
        "ses" => "session",
        "acq" => "acquisition",
        "rec" => "reconstruction",
        "dir" => "direction",
        "ce" => "ceagent",
        other => other,
    }
}

/// Splits a filename into stem and extension at the first dot.
///
/// `sub-01_T1w.nii.gz` gives `("sub-01_T1w", ".nii.gz")`.
#[must_use]
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.find('.') {
        Some(i) => file_name.split_at(i),
        None => (file_name, ""),
    }
}

/// Parses the entities encoded in a file path.
///
/// Keys are expanded (`sub` becomes `subject`, `ses` becomes `session`),
/// the trailing token becomes `suffix` and the extension is kept with its
/// leading dot. A recognised parent directory is reported as `datatype`.
#[must_use]
pub fn parse_entities(path: &Path) -> Entities {
    let mut entities = Entities::new();

    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return entities;
    };
    let (stem, extension) = split_extension(file_name);
    if !extension.is_empty() {
        entities.insert("extension".to_string(), extension.to_string());
    }

    let pattern = entity_pattern();
    let mut tokens = stem.split('_').peekable();
    while let Some(token) = tokens.next() {
        if let Some(caps) = pattern.captures(token) {
            entities.insert(long_key(&caps["key"]).to_string(), caps["value"].to_string());
        } else if tokens.peek().is_none() && !token.contains('-') {
            entities.insert("suffix".to_string(), token.to_string());
        }
    }

    if let Some(datatype) = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .filter(|n| DATATYPES.contains(n))
    {
        entities.insert("datatype".to_string(), datatype.to_string());
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_name() {
        let entities = parse_entities(Path::new("/bids/sub-01/ses-02/anat/sub-01_ses-02_acq-mprage_T1w.nii.gz"));
        assert_eq!(entities.get("subject").map(String::as_str), Some("01"));
        assert_eq!(entities.get("session").map(String::as_str), Some("02"));
        assert_eq!(entities.get("acquisition").map(String::as_str), Some("mprage"));
        assert_eq!(entities.get("suffix").map(String::as_str), Some("T1w"));
        assert_eq!(entities.get("extension").map(String::as_str), Some(".nii.gz"));
        assert_eq!(entities.get("datatype").map(String::as_str), Some("anat"));
    }

    #[test]
    fn test_parse_without_session() {
        let entities = parse_entities(Path::new("sub-abc_dwi.bvec"));
        assert_eq!(entities.get("subject").map(String::as_str), Some("abc"));
        assert!(!entities.contains_key("session"));
        assert_eq!(entities.get("suffix").map(String::as_str), Some("dwi"));
        assert_eq!(entities.get("extension").map(String::as_str), Some(".bvec"));
    }

    #[test]
    fn test_unknown_entities_are_kept() {
        let entities = parse_entities(Path::new("sub-01_space-MNI_desc-preproc_dwi.nii.gz"));
        assert_eq!(entities.get("space").map(String::as_str), Some("MNI"));
        assert_eq!(entities.get("desc").map(String::as_str), Some("preproc"));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a_T1w.nii.gz"), ("a_T1w", ".nii.gz"));
        assert_eq!(split_extension("README"), ("README", ""));
    }
}
