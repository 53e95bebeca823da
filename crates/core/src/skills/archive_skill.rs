//! # Archive Skill
//!
//! Hands an accepted artifact to the Document Auditor role and persists the
//! result. The role works the document store through [`DocumentTools`], one
//! command per invocation, and sees each tool response before its next call.
//! When no write succeeds, the artifact is written as-is under a timestamped
//! name.

use chrono::Local;
use serde_json::Value;
use std::path::PathBuf;

use super::json_extract::extract_as;
use super::roles::{ChatMessage, RoleInvoker, RoleOutput, RoleRequest};
use crate::tools::documents::{document_stem, DocumentCommand, DocumentStore, DocumentTools};

/// Tool calls allowed per archive request
pub const MAX_TOOL_CALLS: usize = 4;

/// A persisted artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReceipt {
    /// Filename stem
    pub document: String,
    pub path: PathBuf,
}

/// Timestamped fallback stem, e.g. `PRD_20260118_093000`
pub fn fallback_stem(prefix: &str) -> String {
    format!("{}_{}", prefix, Local::now().format("%Y%m%d_%H%M%S"))
}

fn parse_command(output: &RoleOutput) -> Option<DocumentCommand> {
    extract_as::<DocumentCommand>(&output.full_text()).or_else(|| {
        output
            .structured
            .clone()
            .and_then(|v| serde_json::from_value::<DocumentCommand>(v).ok())
    })
}

fn succeeded(response: &Value) -> bool {
    response.get("status").and_then(Value::as_str) == Some("success")
}

pub struct DocumentArchiver;

impl DocumentArchiver {
    /// Format and persist `artifact`. Only a successful write yields a receipt.
    pub async fn archive(
        invoker: &dyn RoleInvoker,
        request: RoleRequest,
        store: &dyn DocumentStore,
        artifact: &str,
        fallback_prefix: &str,
    ) -> anyhow::Result<ArchiveReceipt> {
        let tools = DocumentTools::new(store);
        let mut request = request.with_input(artifact).with_schema::<DocumentCommand>();

        for step in 1..=MAX_TOOL_CALLS {
            let output = invoker.invoke(request.clone()).await?;
            let Some(command) = parse_command(&output) else {
                tracing::warn!(step, "Document auditor gave no command, using fallback name");
                break;
            };

            // An empty write means "store the artifact as given"
            let command = match command {
                DocumentCommand::Write { filename, content } if content.trim().is_empty() => {
                    DocumentCommand::Write {
                        filename,
                        content: artifact.to_string(),
                    }
                }
                other => other,
            };

            let response = tools.dispatch(&command).await;
            tracing::info!(
                step,
                operation = command.operation(),
                success = succeeded(&response),
                "Document tool call"
            );

            if let DocumentCommand::Write { filename, .. } = &command {
                if succeeded(&response) {
                    let path = response
                        .get("path")
                        .and_then(Value::as_str)
                        .map(PathBuf::from)
                        .unwrap_or_default();
                    return Ok(ArchiveReceipt {
                        document: document_stem(filename)?,
                        path,
                    });
                }
            }

            request
                .history
                .push(ChatMessage::assistant(serde_json::to_string(&command)?));
            request.history.push(ChatMessage::user(response.to_string()));
        }

        let document = fallback_stem(fallback_prefix);
        let path = store.write(&document, artifact).await?;
        tracing::info!(document = %document, "Artifact archived under fallback name");
        Ok(ArchiveReceipt { document, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelConfig;
    use crate::skills::roles::testing::ScriptedInvoker;
    use crate::skills::roles::Role;
    use crate::tools::documents::FsDocumentStore;

    fn request() -> RoleRequest {
        RoleRequest::new(Role::DocumentAuditor, ModelConfig::default())
    }

    #[tokio::test]
    async fn test_archive_follows_write_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let invoker = ScriptedInvoker::new();
        invoker.push(
            "document_auditor",
            r##"{"operation": "write", "filename": "PRD_v1.md", "content": "# 产品需求文档"}"##,
        );

        let receipt = DocumentArchiver::archive(&invoker, request(), &store, "raw", "PRD")
            .await
            .unwrap();
        assert_eq!(receipt.document, "PRD_v1");
        assert_eq!(store.read("PRD_v1").await.unwrap(), "# 产品需求文档");
        assert_eq!(
            invoker.calls_for("document_auditor")[0].input.as_deref(),
            Some("raw")
        );
    }

    #[tokio::test]
    async fn test_archive_fallback_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let invoker = ScriptedInvoker::new();
        invoker.push("document_auditor", "文档已整理完毕。");

        let receipt = DocumentArchiver::archive(&invoker, request(), &store, "# 总结", "PRD")
            .await
            .unwrap();
        assert!(receipt.document.starts_with("PRD_"));
        assert_eq!(store.read(&receipt.document).await.unwrap(), "# 总结");
    }

    #[tokio::test]
    async fn test_invalid_filename_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let invoker = ScriptedInvoker::new();
        invoker.push(
            "document_auditor",
            r#"{"operation": "write", "filename": "../PRD", "content": "x"}"#,
        );

        let receipt = DocumentArchiver::archive(&invoker, request(), &store, "artifact", "PRD")
            .await
            .unwrap();
        assert!(receipt.document.starts_with("PRD_"));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_responses_reach_the_role() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        store.write("PRD_draft", "旧草稿").await.unwrap();

        let invoker = ScriptedInvoker::new();
        invoker
            .push("document_auditor", r#"{"operation": "list"}"#)
            .push("document_auditor", r#"{"operation": "delete", "filename": "PRD_draft"}"#)
            .push(
                "document_auditor",
                r#"{"operation": "write", "filename": "PRD_v2", "content": ""}"#,
            );

        let receipt = DocumentArchiver::archive(&invoker, request(), &store, "# 总结", "PRD")
            .await
            .unwrap();
        assert_eq!(receipt.document, "PRD_v2");
        assert!(receipt.path.ends_with("PRD_v2.md"));
        assert_eq!(store.list().await.unwrap(), vec!["PRD_v2.md".to_string()]);
        assert_eq!(store.read("PRD_v2").await.unwrap(), "# 总结");

        let calls = invoker.calls_for("document_auditor");
        assert_eq!(calls.len(), 3);
        assert!(calls[0].history.is_empty());
        assert!(calls[1].history[1].content.contains("PRD_draft.md"));
        assert!(calls[2].history[3].content.contains("success"));
    }

    #[tokio::test]
    async fn test_tool_calls_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let invoker = ScriptedInvoker::new();
        for _ in 0..10 {
            invoker.push("document_auditor", r#"{"operation": "list"}"#);
        }

        let receipt = DocumentArchiver::archive(&invoker, request(), &store, "# 总结", "PRD")
            .await
            .unwrap();
        assert!(receipt.document.starts_with("PRD_"));
        assert_eq!(invoker.calls_for("document_auditor").len(), MAX_TOOL_CALLS);
    }

    #[tokio::test]
    async fn test_role_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let invoker = ScriptedInvoker::new();
        invoker.push_error("document_auditor", "timeout");

        assert!(DocumentArchiver::archive(&invoker, request(), &store, "x", "PRD")
            .await
            .is_err());
        assert!(store.list().await.unwrap().is_empty());
    }
}
