//! # Flow Events
//!
//! Everything a turn produces is an event: text relayed to the user, status
//! lines, and state deltas. Events are appended to the session history and
//! streamed to the caller in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::StateDelta;

/// Author of incoming user messages
pub const USER_AUTHOR: &str = "user";
/// Author of host-level notices that are never shown to roles
pub const SYSTEM_AUTHOR: &str = "system";

/// Kind of flow event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowEventKind {
    /// Input from the user
    UserMessage,
    /// Text produced by a role, relayed verbatim
    Message,
    /// Short progress line from the controller
    Status,
    /// Recoverable problem surfaced to the user
    Warning,
    /// Silent state transition
    StateChange,
}

/// An event in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Role author, manager name, or [`USER_AUTHOR`]
    pub author: String,
    pub kind: FlowEventKind,
    #[serde(default)]
    pub text: Option<String>,
    /// State transition carried by this event
    #[serde(default)]
    pub delta: Option<StateDelta>,
}

impl FlowEvent {
    /// Create a new event
    pub fn new(kind: FlowEventKind, author: &str) -> Self {
        Self {
            id: uuid_v4(),
            timestamp: Utc::now(),
            author: author.to_string(),
            kind,
            text: None,
            delta: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(FlowEventKind::UserMessage, USER_AUTHOR).with_text(text)
    }

    pub fn message(author: &str, text: impl Into<String>) -> Self {
        Self::new(FlowEventKind::Message, author).with_text(text)
    }

    pub fn status(author: &str, text: impl Into<String>) -> Self {
        Self::new(FlowEventKind::Status, author).with_text(text)
    }

    pub fn warning(author: &str, text: impl Into<String>) -> Self {
        Self::new(FlowEventKind::Warning, author).with_text(text)
    }

    /// Delta with no user-visible text
    pub fn state_only(author: &str, delta: StateDelta) -> Self {
        Self::new(FlowEventKind::StateChange, author).with_delta(delta)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach a state delta to the event
    pub fn with_delta(mut self, delta: StateDelta) -> Self {
        self.delta = Some(delta);
        self
    }
}

/// Generate a simple unique id
fn uuid_v4() -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("{:x}-{:x}", nanos, rand_u32())
}

/// Simple random number (not cryptographic)
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
