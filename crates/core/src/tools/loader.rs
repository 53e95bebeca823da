//! # Document Loader
//!
//! Read-only access to archived artifacts by explicit path or by keyword.

use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Load a document by path. Missing or unreadable files yield `None`.
pub fn load_by_path(path: &Path) -> Option<String> {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "Document not found");
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read document");
            None
        }
    }
}

/// Content of the most recently modified `.md` file in `dir` whose name
/// contains any of `keywords` (case-insensitive). Subdirectories are not
/// searched.
pub fn find_latest(dir: &Path, keywords: &[&str]) -> Option<String> {
    if !dir.is_dir() {
        return None;
    }

    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut newest: Option<(SystemTime, std::path::PathBuf)> = None;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !name.ends_with(".md") || !keywords.iter().any(|k| name.contains(k)) {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.into_path()));
        }
    }

    let (_, path) = newest?;
    tracing::debug!(path = %path.display(), "Latest matching document");
    load_by_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    fn write_with_mtime(path: &Path, content: &str, secs: u64) {
        fs::write(path, content).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_load_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PRD_v1.md");
        fs::write(&path, "# PRD").unwrap();

        assert_eq!(load_by_path(&path).as_deref(), Some("# PRD"));
        assert!(load_by_path(&dir.path().join("missing.md")).is_none());
    }

    #[test]
    fn test_find_latest_picks_newest_match() {
        let dir = tempfile::tempdir().unwrap();
        write_with_mtime(&dir.path().join("PRD_v1.md"), "old", 1_000);
        write_with_mtime(&dir.path().join("prd_v2.md"), "new", 2_000);
        write_with_mtime(&dir.path().join("research.md"), "newest", 3_000);
        write_with_mtime(&dir.path().join("PRD_v3.txt"), "ignored", 4_000);

        let latest = find_latest(dir.path(), &["prd", "discovery"]);
        assert_eq!(latest.as_deref(), Some("new"));
    }

    #[test]
    fn test_find_latest_without_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "x").unwrap();

        assert!(find_latest(dir.path(), &["prd"]).is_none());
        assert!(find_latest(&dir.path().join("absent"), &["prd"]).is_none());
    }
}
