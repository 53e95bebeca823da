//! # Agentic PM Core
//!
//! Workflow controller for a multi-stage product-management assistant. It
//! decides which LLM role runs next, inspects role output before the user
//! sees it, loops back for revision, and persists every decision in the
//! session state.
//!
//! ## Architecture
//!
//! - `skills/` - Role seam, output parsers, admission/audit/archive/router skills
//! - `models` - LLM provider configuration carried in role requests
//! - `state/` - Versioned session state, stage detection, session stores
//! - `swarm/` - Orchestrator, phase managers, events, configuration
//! - `tools/` - Document store and loader
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentic_pm_core::state::MemorySessionStore;
//! use agentic_pm_core::swarm::{FlowConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(FlowConfig::default().with_env_overrides(), invoker);
//! let store = MemorySessionStore::new();
//! let events = orchestrator.handle_message(&store, "session-1", "我有一个新想法").await?;
//! ```

pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;
