//! # Quality Auditor
//!
//! Scores a phase artifact and turns the report into an archive-or-reject
//! decision. A report that cannot be parsed counts as a rejection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::json_extract::extract_json;
use super::roles::{RoleInvoker, RoleRequest};

/// Instructions used when the auditor gave none
pub const DEFAULT_INSTRUCTIONS: &str = "请继续完善。";

/// Audit verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Reject,
}

/// Structured report produced by the scoring role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuditReport {
    pub verdict: Verdict,
    /// Score in [0, 10]
    pub score: f64,
    /// Short note for the user
    #[serde(default)]
    pub human_message: String,
    /// Rework instructions for the dialogue actor
    #[serde(default)]
    pub system_instructions: String,
    #[serde(default)]
    pub stage_tag: String,
    #[serde(default)]
    pub target_tag: String,
}

impl Default for AuditReport {
    fn default() -> Self {
        Self {
            verdict: Verdict::Reject,
            score: 0.0,
            human_message: String::new(),
            system_instructions: DEFAULT_INSTRUCTIONS.to_string(),
            stage_tag: String::new(),
            target_tag: String::new(),
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

impl AuditReport {
    /// Read a report from an extracted object.
    ///
    /// Missing or malformed fields fall back to the worst case: an
    /// unrecognised verdict rejects, a missing score is 0.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        if map.is_empty() {
            return Self::default();
        }

        let verdict = match map.get("verdict").and_then(Value::as_str) {
            Some(v) if v.trim().eq_ignore_ascii_case("PASS") => Verdict::Pass,
            _ => Verdict::Reject,
        };

        let score = match map.get("score") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
        .clamp(0.0, 10.0);

        let mut system_instructions = string_field(map, "system_instructions");
        if system_instructions.is_empty() {
            system_instructions = DEFAULT_INSTRUCTIONS.to_string();
        }

        Self {
            verdict,
            score,
            human_message: string_field(map, "human_message"),
            system_instructions,
            stage_tag: string_field(map, "stage_tag"),
            target_tag: string_field(map, "target_tag"),
        }
    }
}

/// Acceptance rule for audit reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuditPolicy {
    pub pass_threshold: f64,
    pub max_feedback_cycles: u32,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            pass_threshold: 6.0,
            max_feedback_cycles: 3,
        }
    }
}

/// What the phase does with an audited artifact
#[derive(Debug, Clone, PartialEq)]
pub enum AuditDecision {
    /// Accept and persist; `forced` when the feedback cap was reached
    Archive { score: f64, forced: bool },
    /// Send back to dialogue with these instructions
    Reject { score: f64, feedback: String },
}

impl AuditPolicy {
    /// Decide given the number of rejections already recorded in the phase.
    pub fn decide(&self, report: &AuditReport, feedback_count: u32) -> AuditDecision {
        if report.verdict == Verdict::Pass && report.score >= self.pass_threshold {
            AuditDecision::Archive {
                score: report.score,
                forced: false,
            }
        } else if feedback_count >= self.max_feedback_cycles {
            AuditDecision::Archive {
                score: report.score,
                forced: true,
            }
        } else {
            AuditDecision::Reject {
                score: report.score,
                feedback: report.system_instructions.clone(),
            }
        }
    }
}

pub struct QualityAuditor;

impl QualityAuditor {
    /// Invoke the scoring role and parse its report.
    pub async fn audit(
        invoker: &dyn RoleInvoker,
        request: RoleRequest,
    ) -> anyhow::Result<AuditReport> {
        let output = invoker.invoke(request.with_schema::<AuditReport>()).await?;

        let mut map = extract_json(&output.full_text());
        if map.is_empty() {
            if let Some(Value::Object(structured)) = output.structured {
                map = structured;
            }
        }
        if map.is_empty() {
            tracing::warn!("Audit report could not be parsed, treating as rejection");
        }

        let report = AuditReport::from_map(&map);
        tracing::info!(verdict = ?report.verdict, score = report.score, "Audit complete");
        Ok(report)
    }
}
