//! # Flow Configuration
//!
//! Global and per-role model selection plus the workflow's tunables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{LlmProvider, ModelConfig};
use crate::skills::auditor_skill::AuditPolicy;
use crate::skills::roles::{Role, RoleRequest};

/// Environment variable overriding [`FlowConfig::output_dir`]
pub const OUTPUT_DIR_ENV: &str = "AGENTIC_PM_OUTPUT_DIR";

/// How the per-turn route is decided
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterMode {
    /// Keyword tables, no model call
    #[default]
    RuleBased,
    /// Router role with a structured output schema
    Llm,
}

/// Configuration for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Global LLM provider (default: Anthropic)
    pub global_provider: LlmProvider,
    /// Global model for all roles
    pub global_model: Option<String>,
    /// Base URL override (OpenAI-compatible providers only)
    pub base_url: Option<String>,
    /// Per-role model overrides (role id -> model name)
    pub per_role_models: HashMap<String, String>,
    /// Per-role provider overrides (role id -> provider)
    pub per_role_providers: HashMap<String, LlmProvider>,
    /// Per-role base URL overrides (role id -> base_url)
    pub per_role_base_urls: HashMap<String, String>,
    /// Per-role sampling temperature overrides (role id -> temperature)
    pub per_role_temperatures: HashMap<String, f32>,
    /// Audit rejections before an artifact is archived regardless of score
    pub max_feedback_cycles: u32,
    /// Minimum PASS score
    pub pass_threshold: f64,
    /// Document store directory
    pub output_dir: PathBuf,
    pub router_mode: RouterMode,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            global_provider: LlmProvider::Anthropic,
            global_model: None,
            base_url: None,
            per_role_models: HashMap::new(),
            per_role_providers: HashMap::new(),
            per_role_base_urls: HashMap::new(),
            per_role_temperatures: HashMap::new(),
            max_feedback_cycles: 3,
            pass_threshold: 6.0,
            output_dir: PathBuf::from("outputs"),
            router_mode: RouterMode::RuleBased,
        }
    }
}

/// Built-in temperature per role id
fn default_temperature(role_id: &str) -> Option<f32> {
    match role_id {
        "discovery" | "researcher" => Some(0.9),
        "router" => Some(0.3),
        _ => None,
    }
}

impl FlowConfig {
    /// Load from a JSON file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: FlowConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    /// Apply `AGENTIC_PM_OUTPUT_DIR` when set and non-empty
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir.trim());
            }
        }
        self
    }

    /// Get model config for a role id
    pub fn model_for(&self, role_id: &str) -> ModelConfig {
        // Provider: per-role override -> global
        let provider = self
            .per_role_providers
            .get(role_id)
            .cloned()
            .unwrap_or_else(|| self.global_provider.clone());

        // Model: per-role override -> global -> provider default
        let model = self
            .per_role_models
            .get(role_id)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = if provider.supports_base_url() {
            self.per_role_base_urls
                .get(role_id)
                .or(self.base_url.as_ref())
                .cloned()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }

    pub fn temperature_for(&self, role_id: &str) -> Option<f32> {
        self.per_role_temperatures
            .get(role_id)
            .copied()
            .or_else(|| default_temperature(role_id))
    }

    /// Request skeleton for `role` with its model and temperature resolved
    pub fn request(&self, role: Role) -> RoleRequest {
        RoleRequest::new(role, self.model_for(role.id()))
            .with_temperature(self.temperature_for(role.id()))
    }

    pub fn audit_policy(&self) -> AuditPolicy {
        AuditPolicy {
            pass_threshold: self.pass_threshold,
            max_feedback_cycles: self.max_feedback_cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.max_feedback_cycles, 3);
        assert_eq!(config.pass_threshold, 6.0);
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.router_mode, RouterMode::RuleBased);
        assert_eq!(config.temperature_for("discovery"), Some(0.9));
        assert_eq!(config.temperature_for("router"), Some(0.3));
        assert_eq!(config.temperature_for("quality_auditor"), None);
    }

    #[test]
    fn test_model_resolution() {
        let mut config = FlowConfig {
            global_model: Some("claude-3-haiku".to_string()),
            ..FlowConfig::default()
        };
        config
            .per_role_providers
            .insert("router".to_string(), LlmProvider::OpenAI);
        config
            .per_role_models
            .insert("router".to_string(), "gpt-4o-mini".to_string());
        config.base_url = Some("http://localhost:4000".to_string());

        let router = config.model_for("router");
        assert_eq!(router.provider, LlmProvider::OpenAI);
        assert_eq!(router.model, "gpt-4o-mini");
        assert_eq!(router.base_url.as_deref(), Some("http://localhost:4000"));

        let discovery = config.model_for("discovery");
        assert_eq!(discovery.provider, LlmProvider::Anthropic);
        assert_eq!(discovery.model, "claude-3-haiku");
        assert!(discovery.base_url.is_none());
    }

    #[test]
    fn test_request_carries_temperature_override() {
        let mut config = FlowConfig::default();
        config
            .per_role_temperatures
            .insert("discovery".to_string(), 0.5);

        let request = config.request(Role::DiscoveryInterviewer);
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.model.model, LlmProvider::Anthropic.default_model());
    }

    #[test]
    fn test_from_file_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.json");
        std::fs::write(
            &path,
            r#"{"max_feedback_cycles": 5, "router_mode": "llm", "global_provider": "deepseek"}"#,
        )
        .unwrap();

        let config = FlowConfig::from_file(&path).unwrap();
        assert_eq!(config.max_feedback_cycles, 5);
        assert_eq!(config.router_mode, RouterMode::Llm);
        assert_eq!(config.pass_threshold, 6.0);
        assert_eq!(config.model_for("router").model, "deepseek-chat");
    }

    #[test]
    fn test_from_file_missing() {
        assert!(FlowConfig::from_file("/nonexistent/flow.json").is_err());
    }
}
