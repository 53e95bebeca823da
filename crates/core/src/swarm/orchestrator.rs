//! # Orchestrator
//!
//! Entry point for a user turn: greets on first load, routes the message to
//! a phase, announces phase switches, and delegates to the phase manager.
//! Role failures never escape a turn; they end it with a notice.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::config::{FlowConfig, RouterMode};
use super::events::FlowEvent;
use super::phase::PhaseManager;
use super::pipeline::PhaseStage;
use super::turn::TurnContext;
use super::Phase;
use crate::skills::roles::{Role, RoleInvoker};
use crate::skills::router_skill::{
    LlmRouter, RouteContext, RouteDecider, RouteTarget, RuleBasedRouter, DISCOVERY_KEYWORDS,
    RESEARCH_KEYWORDS,
};
use crate::state::{detect_project_stage, ProjectStage, Session, SessionStore, StateDelta};
use crate::tools::documents::{DocumentStore, FsDocumentStore};

/// Author of the orchestrator's own events
pub const ORCHESTRATOR_NAME: &str = "Agentic_PM";

/// First-load greeting for a detected stage
pub fn greeting(stage: ProjectStage) -> &'static str {
    match stage {
        ProjectStage::Discovery => {
            "你好！我是你的产品经理助手。看起来你还没有开始产品设计，你想从哪个想法开始呢？"
        }
        ProjectStage::Research => {
            "你好！我看到你已经完成了需求分析，现在想进行市场调研吗？还是有其他需求？"
        }
        ProjectStage::Unknown => "你好！我是你的产品经理助手。你想从哪个阶段开始呢？",
    }
}

/// Prompt shown when the route is unclear
pub fn clarification() -> String {
    let examples = |keywords: &[&str]| {
        keywords
            .iter()
            .take(2)
            .map(|k| format!("“{}”", k))
            .collect::<Vec<_>>()
            .join("、")
    };
    format!(
        "抱歉，我不太确定你想做什么。你可以这样告诉我：\n\n- {}：开始{}\n- {}：进行{}",
        examples(DISCOVERY_KEYWORDS),
        Phase::Discovery.display_name(),
        examples(RESEARCH_KEYWORDS),
        Phase::Research.display_name(),
    )
}

/// The top-level workflow controller
pub struct Orchestrator {
    config: FlowConfig,
    invoker: Arc<dyn RoleInvoker>,
    documents: Arc<dyn DocumentStore>,
    router: Arc<dyn RouteDecider>,
    event_tx: Option<mpsc::Sender<FlowEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator with a filesystem document store at
    /// `config.output_dir` and the router selected by `config.router_mode`.
    pub fn new(config: FlowConfig, invoker: Arc<dyn RoleInvoker>) -> Self {
        let documents: Arc<dyn DocumentStore> =
            Arc::new(FsDocumentStore::new(config.output_dir.clone()));
        let router: Arc<dyn RouteDecider> = match config.router_mode {
            RouterMode::RuleBased => Arc::new(RuleBasedRouter),
            RouterMode::Llm => Arc::new(LlmRouter::new(
                Arc::clone(&invoker),
                config.request(Role::Router),
            )),
        };
        Self {
            config,
            invoker,
            documents,
            router,
            event_tx: None,
        }
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_router(mut self, router: Arc<dyn RouteDecider>) -> Self {
        self.router = router;
        self
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<FlowEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run one turn over `session`, whose latest user message is already
    /// appended. Returns the events emitted during the turn.
    #[tracing::instrument(skip_all, fields(session = %session.id))]
    pub async fn run_turn(&self, session: &mut Session) -> Vec<FlowEvent> {
        let mut ctx = TurnContext::new(session, self.event_tx.clone());
        if let Err(e) = self.drive(&mut ctx).await {
            self.report_failure(&mut ctx, &e).await;
        }
        ctx.finish()
    }

    /// Start an incremental discovery cycle from an external instruction.
    #[tracing::instrument(skip(self, session, document_path), fields(session = %session.id))]
    pub async fn run_instruction(
        &self,
        session: &mut Session,
        instruction: &str,
        document_path: Option<&Path>,
    ) -> Vec<FlowEvent> {
        let mut ctx = TurnContext::new(session, self.event_tx.clone());
        self.enter_phase(&mut ctx, Phase::Discovery).await;

        let manager = PhaseManager::new(
            Phase::Discovery,
            &self.config,
            self.invoker.as_ref(),
            self.documents.as_ref(),
        );
        if let Err(e) = manager
            .run_with_instruction(&mut ctx, instruction, document_path)
            .await
        {
            self.report_failure(&mut ctx, &e).await;
        }
        ctx.finish()
    }

    /// Load the session, append `text`, run the turn and save.
    pub async fn handle_message(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        text: &str,
    ) -> Result<Vec<FlowEvent>> {
        let mut session = store
            .load(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));
        session.push_user_message(text);

        let events = self.run_turn(&mut session).await;
        store.save(&session).await?;
        Ok(events)
    }

    async fn report_failure(&self, ctx: &mut TurnContext<'_>, error: &anyhow::Error) {
        tracing::error!(error = %error, "Turn failed");
        ctx.emit(FlowEvent::warning(
            ORCHESTRATOR_NAME,
            format!("⚠️ 处理请求时出错：{}。请稍后重试。", error),
        ))
        .await;
    }

    async fn drive(&self, ctx: &mut TurnContext<'_>) -> Result<()> {
        let stage = detect_project_stage(self.documents.as_ref()).await;

        if !ctx.session().has_agent_events() && !ctx.state().has_greeted {
            tracing::info!(%stage, "First load, greeting user");
            ctx.emit(
                FlowEvent::message(ORCHESTRATOR_NAME, greeting(stage)).with_delta(
                    StateDelta::Greeted {
                        project_stage: stage,
                    },
                ),
            )
            .await;
            return Ok(());
        }

        let user_message = ctx.session().last_user_message();
        if user_message.is_empty() {
            tracing::debug!("Empty user message, nothing to do");
            return Ok(());
        }

        let current = ctx.state().current_agent;
        let decision = self
            .router
            .decide(&RouteContext {
                user_message,
                project_stage: stage,
                current_agent: current,
            })
            .await;
        tracing::info!(
            route = ?decision.target,
            confidence = decision.confidence,
            reason = %decision.reason,
            "Route decided"
        );

        let phase = match decision.target {
            RouteTarget::Unknown => {
                ctx.emit(FlowEvent::message(ORCHESTRATOR_NAME, clarification()))
                    .await;
                return Ok(());
            }
            RouteTarget::Continue => current.unwrap_or_else(|| {
                tracing::warn!("Continue without an active phase, defaulting to discovery");
                Phase::Discovery
            }),
            RouteTarget::Discovery => Phase::Discovery,
            RouteTarget::Research => Phase::Research,
        };

        self.enter_phase(ctx, phase).await;

        let manager = PhaseManager::new(
            phase,
            &self.config,
            self.invoker.as_ref(),
            self.documents.as_ref(),
        );
        let stopped: PhaseStage = manager.run(ctx).await?;
        tracing::debug!(?stopped, "Phase turn finished");
        Ok(())
    }

    /// Record a switch to `phase`; silent on the first routing decision.
    async fn enter_phase(&self, ctx: &mut TurnContext<'_>, phase: Phase) {
        let current = ctx.state().current_agent;
        if current == Some(phase) {
            return;
        }

        let delta = StateDelta::Routed {
            current_agent: phase,
        };
        let event = match current {
            None => FlowEvent::state_only(ORCHESTRATOR_NAME, delta),
            Some(previous) => {
                tracing::info!(from = %previous, to = %phase, "Switching phase");
                FlowEvent::message(
                    ORCHESTRATOR_NAME,
                    format!("正在切换到 {} 阶段...\n\n", phase.display_name()),
                )
                .with_delta(delta)
            }
        };
        ctx.emit(event).await;
    }
}
