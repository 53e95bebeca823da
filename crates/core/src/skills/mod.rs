//! # Agentic PM Skills
//!
//! Everything that talks to an LLM role, and the parsers that read what the
//! roles say back.
//!
//! ## Architecture
//!
//! ```text
//! PhaseManager / Orchestrator
//!   └── Skills (admission, auditor, archive, router)
//!         └── RoleInvoker (host-provided)
//! ```
//!
//! **Parsers:**
//! - `json_extract` - First balanced JSON object in noisy text
//! - `signals` - Dialogue completion markers
//!
//! **Skills:**
//! - `AdmissionSkill` - Gatekeeper for new discovery requests
//! - `QualityAuditor` - Scoring and archive-or-reject decision
//! - `DocumentArchiver` - Persists accepted artifacts
//! - `RuleBasedRouter` / `LlmRouter` - Per-turn phase selection

pub mod json_extract;
pub mod roles;
pub mod signals;

pub mod admission_skill;
pub mod archive_skill;
pub mod auditor_skill;
pub mod router_skill;

pub use admission_skill::{AdmissionOutcome, AdmissionSkill};
pub use archive_skill::{ArchiveReceipt, DocumentArchiver};
pub use auditor_skill::{AuditDecision, AuditPolicy, AuditReport, QualityAuditor, Verdict};
pub use roles::{ChatMessage, Role, RoleInvoker, RoleOutput, RoleRequest};
pub use router_skill::{
    LlmRouter, RouteContext, RouteDecider, RouteDecision, RouteTarget, RuleBasedRouter,
};
pub use signals::{detect_signal, DialogueSignal, SignalMarkers};
