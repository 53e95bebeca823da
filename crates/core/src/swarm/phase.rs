//! # Phase Manager
//!
//! Drives one phase through its stages for a single user turn:
//!
//! ```text
//! ADMISSION → DIALOGUE → CONFIRM_WAIT
//!                 ↑   ↘
//!                 │    AUDIT → ARCHIVE
//!                 └──────┘ (reject)
//! ```
//!
//! Actor output is inspected before it reaches the user; the actor's own
//! markers are the only way a dialogue stage ends. Every loop is bounded by
//! [`FlowConfig::max_feedback_cycles`].

use anyhow::Result;
use std::path::Path;

use super::config::FlowConfig;
use super::events::FlowEvent;
use super::pipeline::{PhaseProfile, PhaseStage};
use super::turn::TurnContext;
use super::Phase;
use crate::skills::admission_skill::{AdmissionOutcome, AdmissionSkill};
use crate::skills::archive_skill::DocumentArchiver;
use crate::skills::auditor_skill::{AuditDecision, QualityAuditor};
use crate::skills::roles::{Role, RoleInvoker};
use crate::skills::signals::{detect_signal, strip_markers, DialogueSignal, MarkerFilter};
use crate::state::StateDelta;
use crate::tools::documents::DocumentStore;
use crate::tools::loader;

pub const ADMISSION_STATUS: &str = "正在审计需求准入...\n\n";
pub const ADMISSION_PASSED: &str = "需求合法，已转交给需求专家为您服务。\n\n";
pub const CONFIRM_PROMPT: &str = "**请确认以上需求总结是否准确。如果确认无误，请回复“确认”或“继续”。如需修改，请直接说明需要调整的内容。**";
pub const REVISION_ACK: &str = "好的，正在根据您的意见进行调整...";
pub const CONFIRMED_STATUS: &str = "收到确认，正在提交 CPO 进行最终审计...\n\n";

/// Feedback stored for the next dialogue run after a rejection
fn rejection_feedback(score: f64, instructions: &str) -> String {
    format!(
        "CPO 审计未通过（得分 {}）。反馈如下：\n\n{}\n\n",
        score, instructions
    )
}

pub struct PhaseManager<'a> {
    profile: PhaseProfile,
    config: &'a FlowConfig,
    invoker: &'a dyn RoleInvoker,
    documents: &'a dyn DocumentStore,
}

impl<'a> PhaseManager<'a> {
    pub fn new(
        phase: Phase,
        config: &'a FlowConfig,
        invoker: &'a dyn RoleInvoker,
        documents: &'a dyn DocumentStore,
    ) -> Self {
        Self {
            profile: PhaseProfile::for_phase(phase),
            config,
            invoker,
            documents,
        }
    }

    /// Run the phase for the current turn. Returns the stage the turn
    /// stopped in.
    #[tracing::instrument(skip_all, fields(phase = %self.profile.phase))]
    pub async fn run(&self, ctx: &mut TurnContext<'_>) -> Result<PhaseStage> {
        let mut stage = if self.profile.requires_admission && !ctx.state().phase.is_sanity_passed {
            PhaseStage::Admission
        } else {
            PhaseStage::Dialogue
        };
        let mut revisions = 0u32;

        loop {
            tracing::debug!(?stage, "Phase stage");
            let next = match stage {
                PhaseStage::Admission => self.admission(ctx).await?,
                PhaseStage::Dialogue => self.dialogue(ctx, &mut revisions).await?,
                PhaseStage::ConfirmWait => self.confirm_wait(ctx).await,
                PhaseStage::Audit => self.audit(ctx).await?,
                PhaseStage::Archive => self.archive(ctx).await?,
                PhaseStage::Done => return Ok(stage),
            };
            if next == PhaseStage::Done {
                return Ok(stage);
            }
            stage = next;
        }
    }

    /// Start an incremental cycle from an instruction and an optional
    /// existing document, then run the phase normally.
    #[tracing::instrument(skip(self, ctx, document_path), fields(phase = %self.profile.phase))]
    pub async fn run_with_instruction(
        &self,
        ctx: &mut TurnContext<'_>,
        instruction: &str,
        document_path: Option<&Path>,
    ) -> Result<PhaseStage> {
        let document = match document_path {
            Some(path) => {
                let loaded = loader::load_by_path(path);
                if loaded.is_none() {
                    ctx.emit(FlowEvent::warning(
                        self.profile.manager_name,
                        format!(
                            "⚠️ 警告：文档路径 {} 不存在，文档可能已丢失。将基于现有信息进行需求挖掘。",
                            path.display()
                        ),
                    ))
                    .await;
                }
                loaded
            }
            None => None,
        };

        let opening = match &document {
            Some(doc) => format!(
                "以下是现有的产品定义文档：\n\n{}\n\n---\n\n**任务指令：{}, 请基于以上文档内容进行增量需求挖掘。**",
                doc, instruction
            ),
            None => format!("**任务指令：{}, 请基于现有信息进行增量需求挖掘。**", instruction),
        };

        let contract = ctx
            .state()
            .phase
            .seeded(instruction, document.unwrap_or_default());
        ctx.emit(FlowEvent::state_only(
            self.profile.manager_name,
            StateDelta::Contract { contract },
        ))
        .await;
        ctx.emit(FlowEvent::user(opening)).await;

        self.run(ctx).await
    }

    async fn admission(&self, ctx: &mut TurnContext<'_>) -> Result<PhaseStage> {
        let name = self.profile.manager_name;
        ctx.emit(FlowEvent::status(name, ADMISSION_STATUS)).await;

        let request = self
            .config
            .request(Role::Admission)
            .with_history(ctx.session().conversation())
            .with_input(ctx.session().last_user_message());

        match AdmissionSkill::run(self.invoker, request).await? {
            AdmissionOutcome::Rejected { human_message } => {
                let contract = ctx.state().phase.with_sanity(false);
                ctx.emit(
                    FlowEvent::message(Role::Admission.author(), human_message)
                        .with_delta(StateDelta::Contract { contract }),
                )
                .await;
                Ok(PhaseStage::Done)
            }
            AdmissionOutcome::Accepted => {
                let contract = ctx.state().phase.with_sanity(true);
                ctx.emit(
                    FlowEvent::status(name, ADMISSION_PASSED)
                        .with_delta(StateDelta::Contract { contract }),
                )
                .await;
                Ok(PhaseStage::Dialogue)
            }
        }
    }

    /// Role input for the dialogue actor, assembled from the phase contract
    fn dialogue_input(&self, ctx: &TurnContext<'_>) -> Option<String> {
        let contract = &ctx.state().phase;
        let mut parts: Vec<String> = Vec::new();

        if !self.profile.prerequisite_keywords.is_empty() {
            match loader::find_latest(&self.config.output_dir, self.profile.prerequisite_keywords) {
                Some(doc) => parts.push(format!("以下是已完成的需求文档：\n\n{}", doc)),
                None => tracing::warn!(
                    dir = %self.config.output_dir.display(),
                    "No prerequisite document found"
                ),
            }
        }
        if contract.instruction_mode && !contract.instruction.is_empty() {
            parts.push(format!("任务指令：{}", contract.instruction));
        }
        if !contract.audit_feedback.is_empty() {
            parts.push(contract.audit_feedback.clone());
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    async fn dialogue(&self, ctx: &mut TurnContext<'_>, revisions: &mut u32) -> Result<PhaseStage> {
        let actor = self.profile.actor;
        let markers = self.profile.markers;

        let mut request = self
            .config
            .request(actor)
            .with_history(ctx.session().conversation())
            .with_state(ctx.state());
        if let Some(input) = self.dialogue_input(ctx) {
            request = request.with_input(input);
        }

        let output = self.invoker.invoke(request).await?;

        let mut filter = MarkerFilter::new(markers);
        for fragment in &output.fragments {
            let text = filter.push(fragment);
            if !text.is_empty() {
                ctx.emit(FlowEvent::message(actor.author(), text)).await;
            }
        }
        let rest = filter.finish();
        if !rest.is_empty() {
            ctx.emit(FlowEvent::message(actor.author(), rest)).await;
        }

        let full_text = output.full_text();
        let signal = detect_signal(&full_text, &markers);
        let artifact = strip_markers(&full_text, &markers);
        tracing::info!(?signal, "Dialogue turn finished");

        // A confirmation replaces the artifact only when there is none yet or
        // the stored one predates the latest audit rejection.
        let phase = self.profile.phase;
        let capture = match signal {
            DialogueSignal::MiningComplete => true,
            DialogueSignal::UserConfirmed => {
                ctx.state().outputs.get(phase).is_none() || ctx.state().phase.artifact_is_stale()
            }
            _ => false,
        };
        if capture && !artifact.is_empty() {
            ctx.emit(FlowEvent::state_only(
                self.profile.manager_name,
                StateDelta::Output {
                    phase,
                    content: artifact,
                },
            ))
            .await;
        }

        match signal {
            DialogueSignal::None => Ok(PhaseStage::Done),
            DialogueSignal::MiningComplete => Ok(PhaseStage::ConfirmWait),
            DialogueSignal::RevisionRequested => {
                *revisions += 1;
                if *revisions > self.config.max_feedback_cycles {
                    tracing::warn!(revisions = *revisions, "Revision limit reached for this turn");
                    return Ok(PhaseStage::Done);
                }
                ctx.emit(FlowEvent::status(self.profile.manager_name, REVISION_ACK))
                    .await;
                Ok(PhaseStage::Dialogue)
            }
            DialogueSignal::UserConfirmed => {
                let contract = ctx.state().phase.confirmed();
                ctx.emit(
                    FlowEvent::status(self.profile.manager_name, CONFIRMED_STATUS)
                        .with_delta(StateDelta::Contract { contract }),
                )
                .await;
                Ok(PhaseStage::Audit)
            }
        }
    }

    async fn confirm_wait(&self, ctx: &mut TurnContext<'_>) -> PhaseStage {
        let contract = ctx.state().phase.awaiting_confirmation();
        ctx.emit(
            FlowEvent::status(self.profile.manager_name, CONFIRM_PROMPT)
                .with_delta(StateDelta::Contract { contract }),
        )
        .await;
        PhaseStage::Done
    }

    async fn audit(&self, ctx: &mut TurnContext<'_>) -> Result<PhaseStage> {
        let name = self.profile.manager_name;
        let phase = self.profile.phase;
        let artifact = ctx.state().outputs.get(phase).unwrap_or_default().to_string();

        let request = self
            .config
            .request(self.profile.auditor())
            .with_state(ctx.state())
            .with_input(artifact);
        let report = QualityAuditor::audit(self.invoker, request).await?;

        let feedback_count = ctx.state().phase.feedback_count;
        match self.config.audit_policy().decide(&report, feedback_count) {
            AuditDecision::Reject { score, feedback } => {
                let stored = rejection_feedback(score, &feedback);
                let contract = ctx.state().phase.rejected(stored.clone());
                tracing::info!(
                    score,
                    feedback_count = contract.feedback_count,
                    "Audit rejected artifact"
                );
                ctx.emit(
                    FlowEvent::status(name, format!("重新生成文档中...\n\n{}", stored))
                        .with_delta(StateDelta::Contract { contract }),
                )
                .await;
                Ok(PhaseStage::Dialogue)
            }
            AuditDecision::Archive { score, forced } => {
                let text = if forced {
                    format!(
                        "CPO 审计未通过次数过多（{}次），得分 {}，请手动优化。\n\n",
                        feedback_count, score
                    )
                } else {
                    format!("CPO 审计通过 (得分: {})。正在申请文档归档...\n\n", score)
                };

                if self.profile.archives {
                    ctx.emit(FlowEvent::status(name, text)).await;
                    Ok(PhaseStage::Archive)
                } else {
                    ctx.emit(FlowEvent::status(name, text).with_delta(StateDelta::Completed))
                        .await;
                    Ok(PhaseStage::Done)
                }
            }
        }
    }

    async fn archive(&self, ctx: &mut TurnContext<'_>) -> Result<PhaseStage> {
        let artifact = ctx
            .state()
            .outputs
            .get(self.profile.phase)
            .unwrap_or_default()
            .to_string();

        let request = self
            .config
            .request(Role::DocumentAuditor)
            .with_history(ctx.session().conversation());
        let receipt = DocumentArchiver::archive(
            self.invoker,
            request,
            self.documents,
            &artifact,
            self.profile.archive_stem,
        )
        .await?;

        ctx.emit(
            FlowEvent::status(
                Role::DocumentAuditor.author(),
                format!("文档已归档：{}\n\n", receipt.path.display()),
            )
            .with_delta(StateDelta::Archived {
                document: receipt.document,
            }),
        )
        .await;
        Ok(PhaseStage::Done)
    }
}
