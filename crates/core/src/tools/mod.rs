//! # Document Tools
//!
//! Filesystem access for archived artifacts.
//!
//! ## Modules
//!
//! - `documents` - Named markdown store and the tool-call surface over it
//! - `loader` - Read-only lookup by path or by filename keyword

pub mod documents;
pub mod loader;

pub use documents::{DocumentCommand, DocumentError, DocumentStore, DocumentTools, FsDocumentStore};
