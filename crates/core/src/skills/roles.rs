//! # Roles
//!
//! The LLM roles coordinated by the workflow, and the narrow seam through
//! which the host invokes them. Prompt text and provider plumbing live on the
//! other side of [`RoleInvoker`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ModelConfig;
use crate::state::SessionState;
use crate::swarm::Phase;

/// A role played by a sub-agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// Gatekeeper that validates a new request is in scope
    Admission,
    /// Requirement discovery interviewer
    DiscoveryInterviewer,
    /// Market researcher (interview-style)
    MarketResearcher,
    /// Scoring auditor configured for one phase's actor
    QualityAuditor { target: Phase },
    /// Formats and persists finished artifacts through document tools
    DocumentAuditor,
    /// Per-turn route classifier
    Router,
}

impl Role {
    /// Stable identifier used for per-role configuration
    pub fn id(&self) -> &'static str {
        match self {
            Role::Admission => "admission",
            Role::DiscoveryInterviewer => "discovery",
            Role::MarketResearcher => "researcher",
            Role::QualityAuditor { .. } => "quality_auditor",
            Role::DocumentAuditor => "document_auditor",
            Role::Router => "router",
        }
    }

    /// Author name attached to events relayed from this role
    pub fn author(&self) -> &'static str {
        match self {
            Role::Admission => "Senior_PM_Auditor",
            Role::DiscoveryInterviewer => "Discovery_Expert",
            Role::MarketResearcher => "Market_Researcher",
            Role::QualityAuditor {
                target: Phase::Discovery,
            } => "Senior_PM_Auditor_for_Discovery_Expert",
            Role::QualityAuditor {
                target: Phase::Research,
            } => "Senior_PM_Auditor_for_Market_Researcher",
            Role::DocumentAuditor => "Document_Auditor",
            Role::Router => "Router_Agent",
        }
    }
}

/// One conversation message as seen by a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Everything a role needs for one invocation
#[derive(Debug, Clone, Serialize)]
pub struct RoleRequest {
    pub role: Role,
    pub model: ModelConfig,
    pub temperature: Option<f32>,
    /// Conversation so far, consecutive same-side messages merged
    pub history: Vec<ChatMessage>,
    /// Snapshot of the session state at invocation time
    pub state: Option<SessionState>,
    /// Role-specific input (content to audit, routing context, ...)
    pub input: Option<String>,
    /// JSON Schema the output must follow, for structured roles
    pub output_schema: Option<serde_json::Value>,
}

impl RoleRequest {
    pub fn new(role: Role, model: ModelConfig) -> Self {
        Self {
            role,
            model,
            temperature: None,
            history: Vec::new(),
            state: None,
            input: None,
            output_schema: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_state(mut self, state: &SessionState) -> Self {
        self.state = Some(state.clone());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Constrain the output to the JSON Schema of `T`
    pub fn with_schema<T: schemars::JsonSchema>(mut self) -> Self {
        self.output_schema = serde_json::to_value(schemars::schema_for!(T)).ok();
        self
    }
}

/// Output of one role invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleOutput {
    /// Text fragments in the order the role produced them
    pub fragments: Vec<String>,
    /// Pre-parsed structured value, when the invoker enforced a schema
    #[serde(default)]
    pub structured: Option<serde_json::Value>,
}

impl RoleOutput {
    /// Output made of a single text fragment
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
            structured: None,
        }
    }

    /// Concatenation of all fragments
    pub fn full_text(&self) -> String {
        self.fragments.concat()
    }
}

/// Invokes an LLM role. Implemented by the host.
#[async_trait]
pub trait RoleInvoker: Send + Sync {
    async fn invoke(&self, request: RoleRequest) -> anyhow::Result<RoleOutput>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ids_and_authors() {
        assert_eq!(Role::DiscoveryInterviewer.id(), "discovery");
        assert_eq!(
            Role::QualityAuditor {
                target: Phase::Research
            }
            .id(),
            "quality_auditor"
        );
        assert_eq!(
            Role::QualityAuditor {
                target: Phase::Discovery
            }
            .author(),
            "Senior_PM_Auditor_for_Discovery_Expert"
        );
    }

    #[test]
    fn test_full_text_concatenates_fragments() {
        let output = RoleOutput {
            fragments: vec!["你好，".to_string(), "请描述你的想法。".to_string()],
            structured: None,
        };
        assert_eq!(output.full_text(), "你好，请描述你的想法。");
    }

    #[test]
    fn test_request_schema_is_attached() {
        #[derive(schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Probe {
            score: f64,
        }

        let request = RoleRequest::new(Role::Router, ModelConfig::default()).with_schema::<Probe>();
        let schema = request.output_schema.unwrap();
        assert!(schema.to_string().contains("score"));
    }
}
