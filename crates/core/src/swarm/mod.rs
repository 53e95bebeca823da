//! # Workflow Orchestration
//!
//! Routes user turns to phases and drives each phase's state machine.
//!
//! ## Turn Flow
//!
//! ```text
//! User message → Orchestrator → Router → PhaseManager
//!                                          Admission → Dialogue ⟷ Audit → Archive
//! ```

pub mod config;
pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod pipeline;
pub mod turn;

pub use config::{FlowConfig, RouterMode};
pub use events::{FlowEvent, FlowEventKind};
pub use orchestrator::Orchestrator;
pub use phase::PhaseManager;
pub use pipeline::{Phase, PhaseProfile, PhaseStage};
pub use turn::TurnContext;
