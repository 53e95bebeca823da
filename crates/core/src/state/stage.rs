//! # Stage Detection
//!
//! Classifies project progress from the document store listing. The result
//! only selects the greeting shown on first load.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tools::documents::DocumentStore;

/// Filename fragments marking a discovery artifact
pub const DISCOVERY_DOC_KEYWORDS: &[&str] = &["prd", "discovery"];
/// Filename fragments marking a research artifact
pub const RESEARCH_DOC_KEYWORDS: &[&str] = &["research", "调研"];

/// Detected project stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStage {
    Discovery,
    Research,
    Unknown,
}

impl ProjectStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStage::Discovery => "discovery",
            ProjectStage::Research => "research",
            ProjectStage::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProjectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn name_matches(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

/// Classify a document listing. Only `.md` names are considered.
pub fn classify_documents<S: AsRef<str>>(files: &[S]) -> ProjectStage {
    let docs: Vec<&str> = files
        .iter()
        .map(AsRef::as_ref)
        .filter(|f| f.to_lowercase().ends_with(".md"))
        .collect();

    if docs.is_empty() {
        return ProjectStage::Discovery;
    }

    let has_discovery_doc = docs.iter().any(|f| name_matches(f, DISCOVERY_DOC_KEYWORDS));
    let has_research_doc = docs.iter().any(|f| name_matches(f, RESEARCH_DOC_KEYWORDS));

    match (has_discovery_doc, has_research_doc) {
        (true, false) => ProjectStage::Research,
        (false, _) => ProjectStage::Discovery,
        (true, true) => ProjectStage::Unknown,
    }
}

/// Detect the project stage from a document store.
///
/// Listing failures classify as [`ProjectStage::Unknown`]; nothing is raised.
pub async fn detect_project_stage(store: &dyn DocumentStore) -> ProjectStage {
    match store.list().await {
        Ok(files) => {
            let stage = classify_documents(&files);
            tracing::info!(%stage, documents = files.len(), "Project stage detected");
            stage
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list documents, stage unknown");
            ProjectStage::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::documents::FsDocumentStore;

    #[test]
    fn test_decision_table() {
        let empty: [&str; 0] = [];
        assert_eq!(classify_documents(&empty), ProjectStage::Discovery);
        assert_eq!(classify_documents(&["PRD_v1.md"]), ProjectStage::Research);
        assert_eq!(
            classify_documents(&["PRD_v1.md", "research_report.md"]),
            ProjectStage::Unknown
        );
        assert_eq!(classify_documents(&["notes.md"]), ProjectStage::Discovery);
        assert_eq!(classify_documents(&["市场调研.md"]), ProjectStage::Discovery);
        assert_eq!(
            classify_documents(&["Discovery_Summary.md", "竞品调研.md"]),
            ProjectStage::Unknown
        );
    }

    #[test]
    fn test_non_markdown_files_are_ignored() {
        assert_eq!(classify_documents(&["PRD_v1.txt"]), ProjectStage::Discovery);
    }

    #[test]
    fn test_absent_directory_is_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().join("outputs"));
        let stage = tokio_test::block_on(detect_project_stage(&store));
        assert_eq!(stage, ProjectStage::Discovery);
    }

    #[tokio::test]
    async fn test_detect_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        store.write("PRD_v1", "# PRD").await.unwrap();
        assert_eq!(detect_project_stage(&store).await, ProjectStage::Research);

        store.write("research_report", "# Research").await.unwrap();
        assert_eq!(detect_project_stage(&store).await, ProjectStage::Unknown);
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("outputs");
        std::fs::write(&file, "not a directory").unwrap();

        let store = FsDocumentStore::new(&file);
        assert_eq!(detect_project_stage(&store).await, ProjectStage::Unknown);
    }
}
