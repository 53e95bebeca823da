//! # Admission Skill
//!
//! Gatekeeper run on a new discovery request. Only an explicit `REJECT`
//! verdict stops the request; anything else lets it through.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json_extract::extract_json;
use super::roles::{RoleInvoker, RoleRequest};

/// Reply shown when a rejection carries no message of its own
pub const DEFAULT_REJECTION: &str = "我是 CPO 助手，请问有什么可以帮您？";

/// Structured output expected from the admission role
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdmissionVerdict {
    /// "PASS" or "REJECT"
    pub verdict: String,
    /// Reply for the user when rejected
    #[serde(default)]
    pub human_message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result of the admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Accepted,
    Rejected { human_message: String },
}

pub struct AdmissionSkill;

impl AdmissionSkill {
    /// Run the admission role and classify its verdict.
    pub async fn run(
        invoker: &dyn RoleInvoker,
        request: RoleRequest,
    ) -> anyhow::Result<AdmissionOutcome> {
        let output = invoker
            .invoke(request.with_schema::<AdmissionVerdict>())
            .await?;

        let mut map = extract_json(&output.full_text());
        if map.is_empty() {
            if let Some(Value::Object(structured)) = output.structured {
                map = structured;
            }
        }
        Ok(Self::classify(&map))
    }

    fn classify(map: &serde_json::Map<String, Value>) -> AdmissionOutcome {
        let verdict = map.get("verdict").and_then(Value::as_str).unwrap_or("");
        if !verdict.trim().eq_ignore_ascii_case("REJECT") {
            return AdmissionOutcome::Accepted;
        }

        let human_message = map
            .get("human_message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_REJECTION)
            .to_string();

        let reason = map.get("reason").and_then(Value::as_str).unwrap_or("");
        tracing::info!(reason = %reason, "Admission rejected request");
        AdmissionOutcome::Rejected { human_message }
    }
}
