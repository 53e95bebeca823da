//! # Document Tools
//!
//! Named markdown artifacts in a flat output directory, keyed by filename
//! stem. The Document Auditor role reaches them through [`DocumentTools`]
//! while archiving; stage detection and research hand-off read them directly.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by a document store
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document '{0}' not found")]
    NotFound(String),

    #[error("Invalid document name '{0}'")]
    InvalidName(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// Storage for named markdown artifacts
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite `name`, returning the written path
    async fn write(&self, name: &str, content: &str) -> DocumentResult<PathBuf>;

    async fn read(&self, name: &str) -> DocumentResult<String>;

    /// Filenames in the store; empty when the store does not exist yet
    async fn list(&self) -> DocumentResult<Vec<String>>;

    async fn delete(&self, name: &str) -> DocumentResult<()>;
}

/// Filename stem for `name`: `.md` suffix removed, path components rejected
pub fn document_stem(name: &str) -> DocumentResult<String> {
    let trimmed = name.trim();
    let stem = trimmed
        .strip_suffix(".md")
        .or_else(|| trimmed.strip_suffix(".MD"))
        .unwrap_or(trimmed)
        .trim();

    if stem.is_empty() || stem.contains('/') || stem.contains('\\') || stem.contains("..") {
        return Err(DocumentError::InvalidName(name.to_string()));
    }
    Ok(stem.to_string())
}

/// Document store rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> DocumentResult<PathBuf> {
        let stem = document_stem(name)?;
        Ok(self.root.join(format!("{}.md", stem)))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn write(&self, name: &str, content: &str) -> DocumentResult<PathBuf> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error(&path, e))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "Document written");
        Ok(path)
    }

    async fn read(&self, name: &str) -> DocumentResult<String> {
        let path = self.path_for(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DocumentError::NotFound(name.to_string())),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn list(&self) -> DocumentResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.root, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                files.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn delete(&self, name: &str) -> DocumentResult<()> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Document deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DocumentError::NotFound(name.to_string())),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// A document tool call, as emitted by the Document Auditor role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum DocumentCommand {
    Write { filename: String, content: String },
    Read { filename: String },
    List,
    Delete { filename: String },
}

impl DocumentCommand {
    pub fn operation(&self) -> &'static str {
        match self {
            DocumentCommand::Write { .. } => "write",
            DocumentCommand::Read { .. } => "read",
            DocumentCommand::List => "list",
            DocumentCommand::Delete { .. } => "delete",
        }
    }
}

/// Tool surface over a [`DocumentStore`].
///
/// Every call answers with a JSON object carrying `status` ("success" or
/// "error") and one of `path`, `content`, `files`, `message`.
pub struct DocumentTools<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> DocumentTools<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub async fn dispatch(&self, command: &DocumentCommand) -> Value {
        match command {
            DocumentCommand::Write { filename, content } => {
                match self.store.write(filename, content).await {
                    Ok(path) => json!({
                        "status": "success",
                        "path": path.display().to_string(),
                        "message": format!("文件已保存: {}", path.display())
                    }),
                    Err(e) => error_response(&e),
                }
            }
            DocumentCommand::Read { filename } => match self.store.read(filename).await {
                Ok(content) => json!({ "status": "success", "content": content }),
                Err(e) => error_response(&e),
            },
            DocumentCommand::List => match self.store.list().await {
                Ok(files) => json!({ "status": "success", "files": files }),
                Err(e) => error_response(&e),
            },
            DocumentCommand::Delete { filename } => match self.store.delete(filename).await {
                Ok(()) => json!({
                    "status": "success",
                    "message": format!("文件已删除: {}", filename)
                }),
                Err(e) => error_response(&e),
            },
        }
    }
}

fn error_response(error: &DocumentError) -> Value {
    tracing::warn!(error = %error, "Document tool call failed");
    json!({ "status": "error", "message": error.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_stem() {
        assert_eq!(document_stem("PRD_v1").unwrap(), "PRD_v1");
        assert_eq!(document_stem("PRD_v1.md").unwrap(), "PRD_v1");
        assert!(matches!(
            document_stem("../escape"),
            Err(DocumentError::InvalidName(_))
        ));
        assert!(document_stem("a/b").is_err());
        assert!(document_stem(".md").is_err());
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().join("outputs"));

        let path = store.write("PRD_v1", "first").await.unwrap();
        assert!(path.ends_with("PRD_v1.md"));
        store.write("PRD_v1.md", "second").await.unwrap();

        assert_eq!(store.read("PRD_v1").await.unwrap(), "second");
        assert_eq!(store.list().await.unwrap(), vec!["PRD_v1.md".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());

        assert!(matches!(
            store.read("nope").await,
            Err(DocumentError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("nope").await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_absent_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().join("missing"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_responses() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let tools = DocumentTools::new(&store);

        let command: DocumentCommand = serde_json::from_value(json!({
            "operation": "write",
            "filename": "PRD_v1",
            "content": "# PRD"
        }))
        .unwrap();
        let written = tools.dispatch(&command).await;
        assert_eq!(written["status"], "success");
        assert!(written["path"].as_str().unwrap().ends_with("PRD_v1.md"));

        let read = tools
            .dispatch(&DocumentCommand::Read {
                filename: "PRD_v1".to_string(),
            })
            .await;
        assert_eq!(read["content"], "# PRD");

        let listed = tools.dispatch(&DocumentCommand::List).await;
        assert_eq!(listed["files"], json!(["PRD_v1.md"]));

        let deleted = tools
            .dispatch(&DocumentCommand::Delete {
                filename: "PRD_v1".to_string(),
            })
            .await;
        assert_eq!(deleted["status"], "success");

        let missing = tools
            .dispatch(&DocumentCommand::Read {
                filename: "PRD_v1".to_string(),
            })
            .await;
        assert_eq!(missing["status"], "error");
        assert!(missing["message"].as_str().unwrap().contains("not found"));
    }
}
