//! # Router
//!
//! Picks the phase that handles a user turn. Two deciders share one
//! contract: a keyword table and a structured-output router role. Neither
//! ever fails; doubt resolves to [`RouteTarget::Unknown`].

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::json_extract::extract_json;
use super::roles::{Role, RoleInvoker, RoleRequest};
use crate::state::ProjectStage;
use crate::swarm::Phase;

/// Phrases that start or restart requirement discovery
pub const DISCOVERY_KEYWORDS: &[&str] = &[
    "新想法",
    "新需求",
    "修改需求",
    "重新开始",
    "需求分析",
    "产品想法",
];

/// Phrases that ask for market research
pub const RESEARCH_KEYWORDS: &[&str] = &[
    "市场调研",
    "竞品分析",
    "行业分析",
    "对标",
    "竞争对手",
    "市场研究",
];

/// Where a turn goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    Discovery,
    Research,
    /// Stay with the current phase
    Continue,
    /// Ask the user to clarify
    Unknown,
}

impl RouteTarget {
    /// Parse a target name; anything outside the closed set is `Unknown`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "discovery" => RouteTarget::Discovery,
            "research" => RouteTarget::Research,
            "continue" => RouteTarget::Continue,
            _ => RouteTarget::Unknown,
        }
    }
}

/// Routing decision for one user turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteDecision {
    #[serde(alias = "target_agent")]
    pub target: RouteTarget,
    pub reason: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl RouteDecision {
    pub fn new(target: RouteTarget, reason: impl Into<String>, confidence: f32) -> Self {
        Self {
            target,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new(RouteTarget::Unknown, reason, 0.0)
    }

    /// Read a decision from an extracted object; `None` without a target.
    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        let target = map
            .get("target")
            .or_else(|| map.get("target_agent"))
            .and_then(Value::as_str)?;
        let reason = map
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let confidence = map
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32;

        Some(Self::new(RouteTarget::parse(target), reason, confidence))
    }
}

/// Inputs for a routing decision
#[derive(Debug, Clone, Serialize)]
pub struct RouteContext {
    pub user_message: String,
    pub project_stage: ProjectStage,
    pub current_agent: Option<Phase>,
}

#[async_trait]
pub trait RouteDecider: Send + Sync {
    async fn decide(&self, context: &RouteContext) -> RouteDecision;
}

fn matched_keyword(message: &str, keywords: &[&'static str]) -> Option<&'static str> {
    let lower = message.to_lowercase();
    keywords
        .iter()
        .copied()
        .find(|k| lower.contains(&k.to_lowercase()))
}

/// Keyword router
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedRouter;

impl RuleBasedRouter {
    pub fn route(&self, context: &RouteContext) -> RouteDecision {
        if let Some(keyword) = matched_keyword(&context.user_message, DISCOVERY_KEYWORDS) {
            return RouteDecision::new(
                RouteTarget::Discovery,
                format!("命中需求分析关键词「{}」", keyword),
                1.0,
            );
        }
        if let Some(keyword) = matched_keyword(&context.user_message, RESEARCH_KEYWORDS) {
            return RouteDecision::new(
                RouteTarget::Research,
                format!("命中市场调研关键词「{}」", keyword),
                1.0,
            );
        }
        match context.current_agent {
            Some(phase) => RouteDecision::new(
                RouteTarget::Continue,
                format!("未命中关键词，继续当前阶段 {}", phase),
                0.6,
            ),
            None => RouteDecision::new(RouteTarget::Discovery, "未命中关键词，默认进入需求分析", 0.5),
        }
    }
}

#[async_trait]
impl RouteDecider for RuleBasedRouter {
    async fn decide(&self, context: &RouteContext) -> RouteDecision {
        self.route(context)
    }
}

/// Router backed by the router role
pub struct LlmRouter {
    invoker: Arc<dyn RoleInvoker>,
    request: RoleRequest,
}

impl LlmRouter {
    /// `request` is the router role's request skeleton (model, temperature)
    pub fn new(invoker: Arc<dyn RoleInvoker>, request: RoleRequest) -> Self {
        Self { invoker, request }
    }
}

#[async_trait]
impl RouteDecider for LlmRouter {
    async fn decide(&self, context: &RouteContext) -> RouteDecision {
        let input = serde_json::to_string(context).unwrap_or_else(|_| context.user_message.clone());
        let request = RoleRequest {
            role: Role::Router,
            ..self.request.clone()
        }
        .with_input(input)
        .with_schema::<RouteDecision>();

        let output = match self.invoker.invoke(request).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "Router role failed");
                return RouteDecision::unknown(format!("路由失败: {}", e));
            }
        };

        let from_text = RouteDecision::from_map(&extract_json(&output.full_text()));
        let from_structured = || match &output.structured {
            Some(Value::Object(map)) => RouteDecision::from_map(map),
            _ => None,
        };

        match from_text.or_else(from_structured) {
            Some(decision) => decision,
            None => {
                tracing::warn!("Router output had no decision");
                RouteDecision::unknown("无法解析路由结果")
            }
        }
    }
}
