//! # Session State
//!
//! The only channel for persisting decisions between turns. Every transition
//! is a [`StateDelta`] carried by an event; [`SessionState::apply`] turns the
//! old value into a full replacement, so no field is ever updated in
//! isolation from the rest of its contract.

use serde::{Deserialize, Serialize};

use super::stage::ProjectStage;
use crate::skills::roles::ChatMessage;
use crate::swarm::events::{FlowEvent, SYSTEM_AUTHOR, USER_AUTHOR};
use crate::swarm::Phase;

/// State contract of the active phase.
///
/// Always written as a whole: constructors below derive the next contract
/// from the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseContract {
    pub is_sanity_passed: bool,
    pub user_confirmed: bool,
    pub feedback_count: u32,
    pub audit_feedback: String,
    /// Incremental mode seeded by an external instruction
    pub instruction_mode: bool,
    pub instruction: String,
    pub document_content: String,
    /// `feedback_count` when the phase output was last captured
    #[serde(default)]
    pub artifact_feedback_count: u32,
}

impl PhaseContract {
    /// Admission result; clears any pending confirmation
    pub fn with_sanity(&self, passed: bool) -> Self {
        Self {
            is_sanity_passed: passed,
            user_confirmed: false,
            ..self.clone()
        }
    }

    /// Summary shown, waiting for the user to confirm or ask for changes
    pub fn awaiting_confirmation(&self) -> Self {
        Self {
            user_confirmed: false,
            ..self.clone()
        }
    }

    /// Actor reported an explicit user confirmation
    pub fn confirmed(&self) -> Self {
        Self {
            user_confirmed: true,
            ..self.clone()
        }
    }

    /// Audit rejected the artifact
    pub fn rejected(&self, feedback: impl Into<String>) -> Self {
        Self {
            user_confirmed: false,
            feedback_count: self.feedback_count + 1,
            audit_feedback: feedback.into(),
            ..self.clone()
        }
    }

    /// Fresh instruction-mode cycle; keeps the feedback counter
    pub fn seeded(&self, instruction: impl Into<String>, document_content: impl Into<String>) -> Self {
        Self {
            is_sanity_passed: false,
            user_confirmed: false,
            feedback_count: self.feedback_count,
            audit_feedback: String::new(),
            instruction_mode: true,
            instruction: instruction.into(),
            document_content: document_content.into(),
            artifact_feedback_count: self.artifact_feedback_count,
        }
    }

    /// Whether the captured output predates the latest audit rejection
    pub fn artifact_is_stale(&self) -> bool {
        self.artifact_feedback_count < self.feedback_count
    }
}

/// Last full dialogue output per phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutputs {
    pub discovery: Option<String>,
    pub research: Option<String>,
}

impl PhaseOutputs {
    pub fn get(&self, phase: Phase) -> Option<&str> {
        match phase {
            Phase::Discovery => self.discovery.as_deref(),
            Phase::Research => self.research.as_deref(),
        }
    }

    fn set(&mut self, phase: Phase, content: String) {
        match phase {
            Phase::Discovery => self.discovery = Some(content),
            Phase::Research => self.research = Some(content),
        }
    }
}

/// Versioned session state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Incremented on every applied delta
    pub version: u64,
    pub current_agent: Option<Phase>,
    pub phase: PhaseContract,
    #[serde(rename = "_has_greeted")]
    pub has_greeted: bool,
    pub project_stage: Option<ProjectStage>,
    pub outputs: PhaseOutputs,
    /// Stem of the last document archived by a phase
    pub last_archived: Option<String>,
}

/// A whole-value state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateDelta {
    /// First-load greeting sent
    Greeted { project_stage: ProjectStage },
    /// Control handed to a new phase; its contract starts fresh
    Routed { current_agent: Phase },
    /// Phase contract replaced
    Contract { contract: PhaseContract },
    /// Dialogue output captured for a phase
    Output { phase: Phase, content: String },
    /// Artifact persisted; the phase cycle ends
    Archived { document: String },
    /// Phase accepted without archiving; the phase cycle ends
    Completed,
}

impl SessionState {
    /// Produce the state that results from applying `delta`.
    pub fn apply(&self, delta: &StateDelta) -> SessionState {
        let mut next = self.clone();
        next.version += 1;
        match delta {
            StateDelta::Greeted { project_stage } => {
                next.has_greeted = true;
                next.project_stage = Some(*project_stage);
            }
            StateDelta::Routed { current_agent } => {
                next.current_agent = Some(*current_agent);
                next.phase = PhaseContract::default();
            }
            StateDelta::Contract { contract } => {
                next.phase = contract.clone();
            }
            StateDelta::Output { phase, content } => {
                next.outputs.set(*phase, content.clone());
                next.phase.artifact_feedback_count = next.phase.feedback_count;
            }
            StateDelta::Archived { document } => {
                next.last_archived = Some(document.clone());
                next.phase = PhaseContract::default();
            }
            StateDelta::Completed => {
                next.phase = PhaseContract::default();
            }
        }
        next
    }
}

/// A conversation: its event history plus the state those events produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    pub events: Vec<FlowEvent>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::default(),
            events: Vec::new(),
        }
    }

    /// Append an incoming user message
    pub fn push_user_message(&mut self, text: impl Into<String>) {
        self.events.push(FlowEvent::user(text));
    }

    /// Append an event and apply its delta
    pub fn record(&mut self, event: FlowEvent) {
        if let Some(delta) = &event.delta {
            self.state = self.state.apply(delta);
        }
        self.events.push(event);
    }

    /// Whether any agent (non-user, non-system) event exists
    pub fn has_agent_events(&self) -> bool {
        self.events
            .iter()
            .any(|e| e.author != USER_AUTHOR && e.author != SYSTEM_AUTHOR)
    }

    /// Latest user message, trimmed; empty when there is none
    pub fn last_user_message(&self) -> String {
        self.events
            .iter()
            .rev()
            .filter(|e| e.author == USER_AUTHOR)
            .find_map(|e| e.text.as_deref())
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    /// Conversation for role requests.
    ///
    /// Consecutive messages from the same side are merged; strict chat
    /// templates reject repeated roles.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = Vec::new();
        for event in &self.events {
            if event.author == SYSTEM_AUTHOR {
                continue;
            }
            let Some(text) = event.text.as_deref().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let role = if event.author == USER_AUTHOR {
                "user"
            } else {
                "assistant"
            };
            match messages.last_mut() {
                Some(last) if last.role == role => last.content.push_str(text),
                _ => messages.push(ChatMessage {
                    role: role.to_string(),
                    content: text.to_string(),
                }),
            }
        }
        messages
    }
}
