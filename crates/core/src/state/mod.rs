//! # Session State
//!
//! Versioned session state, stage detection, and session persistence.

pub mod db;
pub mod session;
pub mod session_store;
pub mod stage;

pub use db::FlowDb;

pub use session::{PhaseContract, PhaseOutputs, Session, SessionState, StateDelta};
pub use session_store::{MemorySessionStore, SessionStore, SqliteSessionStore};
pub use stage::{classify_documents, detect_project_stage, ProjectStage};
