//! Orchestrator - drives one run end to end.
//!
//! Owns the WorkflowState for the run's lifetime, interprets the plan with
//! an exhaustive match over stage kinds, runs the verify/reflect retry loop
//! per target, joins the background image task exactly once before publish,
//! and always hands the caller a complete result. `run` is infallible at
//! its boundary: a fatal internal error marks the run failed and returns
//! whatever partial outcome exists.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use refract_config::{RefractConfig, TargetProfile};
use refract_core::store::{KnowledgeGraph, OutcomeStore, SemanticStore};
use refract_core::types::{
    BrandProfile, ImageOutput, PublishOutput, StageKind, Target, WorkflowResult, WorkflowState,
    WorkflowStatus,
};
use refract_core::verifier::{
    verify, LengthBounds, VerificationResult, VerificationRules, VerifyCandidate,
};
use refract_services::{GenerationService, ImageChain};
use refract_stores::{WorkflowEvent, WorkflowEventBus};

use crate::context::ContextMerger;
use crate::kpi::build_result;
use crate::planner::Planner;
use crate::reflector::{Reflector, RetryDecision};
use crate::stages::{GenerateStage, IngestStage, PublishStage, ReviewStage};

const MAX_IMAGE_PROMPT_CHARS: usize = 200;

/// Collaborators injected into the engine.
pub struct EngineServices {
    pub generation: Arc<dyn GenerationService>,
    pub semantic: Arc<dyn SemanticStore>,
    pub graph: Arc<dyn KnowledgeGraph>,
    pub image: Arc<ImageChain>,
}

/// Fatal run-level failures. These never cross `run`'s boundary; they are
/// caught once at the top and folded into the result.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{stage} invariant violated: {message}")]
    Internal { stage: StageKind, message: String },
}

pub struct Orchestrator {
    planner: Planner,
    context: ContextMerger,
    ingest: IngestStage,
    generate: GenerateStage,
    review: ReviewStage,
    publish: PublishStage,
    reflector: Reflector,
    image: Arc<ImageChain>,
    semantic: Arc<dyn SemanticStore>,
    graph: Arc<dyn KnowledgeGraph>,
    bus: Arc<WorkflowEventBus>,
    outcomes: Arc<dyn OutcomeStore>,
    config: RefractConfig,
}

impl Orchestrator {
    pub fn new(
        services: EngineServices,
        bus: Arc<WorkflowEventBus>,
        outcomes: Arc<dyn OutcomeStore>,
        config: RefractConfig,
    ) -> Self {
        let call_timeout = Duration::from_secs(config.engine.stage_timeout_secs);
        Self {
            planner: Planner::new(services.generation.clone(), call_timeout),
            context: ContextMerger::new(
                services.semantic.clone(),
                services.graph.clone(),
                call_timeout,
            ),
            ingest: IngestStage::new(services.generation.clone(), call_timeout),
            generate: GenerateStage::new(services.generation.clone(), call_timeout),
            review: ReviewStage::new(
                services.generation.clone(),
                services.semantic.clone(),
                call_timeout,
                config.verification.score_threshold,
            ),
            publish: PublishStage::new(),
            reflector: Reflector::new(services.generation, call_timeout),
            image: services.image,
            semantic: services.semantic,
            graph: services.graph,
            bus,
            outcomes,
            config,
        }
    }

    /// The engine's only entry point. Always returns a structured result;
    /// there is no scenario in which an error propagates to the caller.
    pub async fn run(
        &self,
        source_content: impl Into<String>,
        brand_profile: Option<BrandProfile>,
        targets: Vec<Target>,
    ) -> WorkflowResult {
        let targets = Target::dedup(targets);
        let goal = format!(
            "Repurpose source content into {} platform variant(s): {}",
            targets.len(),
            targets
                .iter()
                .map(Target::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut state = WorkflowState::new(
            goal,
            source_content,
            brand_profile,
            targets,
            self.config.engine.max_retries,
        );

        info!(workflow_id = %state.id, targets = state.targets.len(), "workflow run started");
        self.emit_log(&state, "info", "run accepted");

        match self.execute(&mut state).await {
            Ok(()) => state.set_status(WorkflowStatus::Completed),
            Err(e) => {
                error!(workflow_id = %state.id, error = %e, "run failed, returning partial result");
                let RuntimeError::Internal { stage, message } = &e;
                state.record_error(*stage, message.clone());
                state.set_status(WorkflowStatus::Failed);
            }
        }

        let result = build_result(&state);
        if let Err(e) = self.outcomes.save(&state, &result).await {
            warn!(workflow_id = %state.id, error = %e, "failed to persist outcome");
        }
        self.bus.publish(WorkflowEvent::complete(
            state.id.as_str(),
            state.status.as_str(),
            result.kpi.published_count,
        ));
        info!(
            workflow_id = %state.id,
            status = state.status.as_str(),
            published = result.kpi.published_count,
            "workflow run finished"
        );
        result
    }

    async fn execute(&self, state: &mut WorkflowState) -> Result<(), RuntimeError> {
        // Context retrieval: fault-tolerant, never blocks the run.
        self.emit_progress(state, StageKind::Context, None, "merging identity context");
        let context = self
            .context
            .merge(&state.source_content, state.brand_profile.as_ref())
            .await;
        state.record_trace(
            StageKind::Context,
            "source content and brand profile".to_string(),
            format!(
                "semantic_found={} graph_found={}",
                context.semantic_found, context.graph_found
            ),
            "identity context".to_string(),
        );
        state.identity_context = Some(context);

        // Planning: guaranteed to produce a plan.
        self.emit_progress(state, StageKind::Planning, None, "building plan");
        let outcome = self
            .planner
            .plan(
                &state.goal,
                &state.targets,
                state.brand_profile.is_some(),
            )
            .await;
        state.record_decision(StageKind::Planning, None, outcome.outcome, outcome.rationale);
        self.emit_decision(state, StageKind::Planning, outcome.outcome, &outcome.plan.stage_summary());
        state.set_plan(outcome.plan);
        state.set_status(WorkflowStatus::Executing);

        // Background enrichment runs concurrently with the text loop and
        // is joined exactly once, right before publish.
        let mut image_task = self.spawn_image_task(state);
        let mut publish_done = false;

        while state.cursor < state.plan.steps.len() {
            let step = state.plan.steps[state.cursor].clone();
            match step.stage {
                StageKind::Ingest => {
                    if state.ingest.is_some() {
                        state.record_decision(
                            StageKind::Ingest,
                            None,
                            "skipped",
                            "ingest already completed for this run",
                        );
                    } else {
                        self.emit_progress(state, StageKind::Ingest, None, "analyzing source");
                        self.ingest.run(state).await;
                    }
                }
                StageKind::Generate => {
                    if let Some(target) = step.target.clone() {
                        state.begin_target(&target);
                        let profile = self.config.target_profile(target.as_str());
                        self.emit_progress(state, StageKind::Generate, Some(&target), "drafting");
                        self.generate.run(state, &target, &profile, None).await;
                    } else {
                        state.record_decision(
                            StageKind::Generate,
                            None,
                            "skipped",
                            "generate step without a target",
                        );
                    }
                }
                StageKind::Review => {
                    if let Some(target) = step.target.clone() {
                        self.review_and_gate(state, &target).await?;
                    } else {
                        state.record_decision(
                            StageKind::Review,
                            None,
                            "skipped",
                            "review step without a target",
                        );
                    }
                }
                StageKind::Publish => {
                    if publish_done {
                        state.record_decision(
                            StageKind::Publish,
                            None,
                            "skipped",
                            "publish already completed for this run",
                        );
                    } else {
                        publish_done = true;
                        self.join_image_task(state, &mut image_task).await;
                        self.emit_progress(state, StageKind::Publish, None, "formatting approved variants");
                        let outputs = self.publish.run(state);
                        self.remember_published(state, &outputs).await;
                    }
                }
                // Non-plannable kinds cannot appear in a parsed plan; skip
                // defensively if a future planner emits them.
                StageKind::Planning
                | StageKind::Context
                | StageKind::Verify
                | StageKind::Reflect
                | StageKind::Image => {
                    state.record_decision(
                        step.stage,
                        step.target.clone(),
                        "skipped",
                        "stage is not plannable",
                    );
                }
            }
            state.cursor += 1;
        }

        // A plan without a publish step never joined the enrichment task;
        // it is abandoned, not awaited twice.
        if let Some(handle) = image_task.take() {
            handle.abort();
        }

        Ok(())
    }

    /// Review → verify → (reflect → regenerate)* for one target. The loop
    /// is bounded by the retry budget; escalation flags the target and the
    /// run moves on.
    async fn review_and_gate(
        &self,
        state: &mut WorkflowState,
        target: &Target,
    ) -> Result<(), RuntimeError> {
        if !state.drafts.contains_key(target) {
            return Err(RuntimeError::Internal {
                stage: StageKind::Review,
                message: format!("review step for '{}' has no draft", target),
            });
        }
        let profile = self.config.target_profile(target.as_str());

        self.emit_progress(state, StageKind::Review, Some(target), "scoring brand consistency");
        self.review.run(state, target).await;
        self.emit_progress(state, StageKind::Verify, Some(target), "running deterministic checks");
        let mut verification = self.verify_target(state, target, &profile);

        loop {
            if verification.passed {
                state.record_decision(
                    StageKind::Verify,
                    Some(target.clone()),
                    "passed",
                    verification.summary.clone(),
                );
                state.mark_published(target);
                let score = state.reviews.get(target).map(|r| r.score).unwrap_or(0.0);
                self.bus.publish(WorkflowEvent::result(
                    state.id.as_str(),
                    target.as_str(),
                    true,
                    score,
                ));
                return Ok(());
            }

            state.record_error(StageKind::Verify, verification.summary.clone());
            state.record_decision(
                StageKind::Verify,
                Some(target.clone()),
                "failed",
                verification.summary.clone(),
            );

            state.set_status(WorkflowStatus::Reflecting);
            self.emit_progress(state, StageKind::Reflect, Some(target), "diagnosing failure");
            let reflection = {
                let history = state.decisions_for(target);
                self.reflector
                    .reflect(&verification.summary, target, &state.goal, &history)
                    .await
            };
            let decision =
                Reflector::decide(state.retry_count, state.max_retries, &reflection);
            state.set_status(WorkflowStatus::Executing);

            match decision {
                RetryDecision::Retry { strategy } => {
                    state.record_decision(
                        StageKind::Reflect,
                        Some(target.clone()),
                        "retry",
                        strategy.clone(),
                    );
                    self.emit_decision(state, StageKind::Reflect, "retry", &strategy);
                    state.bump_retry();
                    self.emit_progress(
                        state,
                        StageKind::Generate,
                        Some(target),
                        "regenerating with remediation hint",
                    );
                    self.generate
                        .run(state, target, &profile, Some(&reflection))
                        .await;
                    self.review.run(state, target).await;
                    verification = self.verify_target(state, target, &profile);
                }
                RetryDecision::Escalate { reason } => {
                    state.record_decision(
                        StageKind::Reflect,
                        Some(target.clone()),
                        "escalate",
                        reason.clone(),
                    );
                    self.emit_decision(state, StageKind::Reflect, "escalate", &reason);
                    state.mark_escalated(target);
                    let score = state.reviews.get(target).map(|r| r.score).unwrap_or(0.0);
                    self.bus.publish(WorkflowEvent::result(
                        state.id.as_str(),
                        target.as_str(),
                        false,
                        score,
                    ));
                    return Ok(());
                }
            }
        }
    }

    fn verify_target(
        &self,
        state: &mut WorkflowState,
        target: &Target,
        profile: &TargetProfile,
    ) -> VerificationResult {
        let content = state
            .drafts
            .get(target)
            .map(|d| d.content.clone())
            .unwrap_or_default();
        let review_score = state.reviews.get(target).map(|r| r.score).unwrap_or(0.0);
        let rules = self.rules_for(profile, state.brand_profile.as_ref());
        let result = verify(
            &VerifyCandidate {
                content: &content,
                review_score,
            },
            &rules,
        );
        state.record_trace(
            StageKind::Verify,
            format!(
                "target={} candidate ({} chars), review score {:.1}",
                target,
                content.chars().count(),
                review_score
            ),
            format!("passed={}", result.passed),
            result.summary.clone(),
        );
        result
    }

    fn rules_for(
        &self,
        profile: &TargetProfile,
        brand: Option<&BrandProfile>,
    ) -> VerificationRules {
        let verification = &self.config.verification;
        let mut required_keywords = verification.required_keywords.clone();
        let mut forbidden_phrases = verification.forbidden_phrases.clone();
        if let Some(brand) = brand {
            required_keywords.extend(brand.required_keywords.iter().cloned());
            forbidden_phrases.extend(brand.forbidden_words.iter().cloned());
        }
        VerificationRules {
            length: LengthBounds {
                min: profile.min_chars,
                max: profile.max_chars,
            },
            required_keywords,
            keywords_required: verification.keywords_required,
            forbidden_phrases,
            score_threshold: verification.score_threshold,
            require_paragraph_breaks: profile.require_paragraph_breaks,
        }
    }

    fn spawn_image_task(&self, state: &mut WorkflowState) -> Option<JoinHandle<ImageOutput>> {
        if !self.config.services.image.enabled {
            return None;
        }
        let chain = self.image.clone();
        let prompt = format!(
            "Illustration for: {}",
            crate::stages::preview(&state.source_content, MAX_IMAGE_PROMPT_CHARS)
        );
        state.record_decision(
            StageKind::Image,
            None,
            "started",
            "background enrichment task spawned",
        );
        Some(tokio::spawn(async move { chain.resolve(&prompt).await }))
    }

    /// Join the enrichment task exactly once. A task failure costs only
    /// the image attachment, never the run.
    async fn join_image_task(
        &self,
        state: &mut WorkflowState,
        image_task: &mut Option<JoinHandle<ImageOutput>>,
    ) {
        let Some(handle) = image_task.take() else {
            return;
        };
        match handle.await {
            Ok(image) => {
                state.record_trace(
                    StageKind::Image,
                    "background enrichment task".to_string(),
                    format!("provider={} placeholder={}", image.provider, image.placeholder),
                    "image attachment".to_string(),
                );
                state.image_generation = Some(image);
            }
            Err(e) => {
                warn!(workflow_id = %state.id, error = %e, "enrichment task failed; publishing without image");
                state.record_error(StageKind::Image, format!("enrichment task failed: {}", e));
            }
        }
    }

    /// Feed published variants back into the memory collaborators so later
    /// runs can retrieve them. Best-effort on both stores.
    async fn remember_published(&self, state: &mut WorkflowState, outputs: &[PublishOutput]) {
        let call_timeout = Duration::from_secs(self.config.engine.stage_timeout_secs);
        for output in outputs {
            let mut metadata = std::collections::HashMap::new();
            metadata.insert("target".to_string(), output.target.to_string());
            metadata.insert("workflow_id".to_string(), state.id.to_string());
            match timeout(call_timeout, self.semantic.upsert(&output.payload, metadata)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "failed to index published variant"),
                Err(_) => warn!("indexing published variant timed out"),
            }

            if let Some(brand) = state.brand_profile.clone() {
                match timeout(
                    call_timeout,
                    self.graph.record_past_work(&brand.name, &output.payload),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "failed to record past work"),
                    Err(_) => warn!("recording past work timed out"),
                }
            }
        }
    }

    fn emit_log(&self, state: &WorkflowState, level: &str, message: &str) {
        self.bus
            .publish(WorkflowEvent::log(state.id.as_str(), level, message));
    }

    fn emit_progress(
        &self,
        state: &WorkflowState,
        stage: StageKind,
        target: Option<&Target>,
        detail: &str,
    ) {
        self.bus.publish(WorkflowEvent::progress(
            state.id.as_str(),
            stage.as_str(),
            target.map(|t| t.to_string()),
            detail,
        ));
    }

    fn emit_decision(&self, state: &WorkflowState, stage: StageKind, outcome: &str, rationale: &str) {
        self.bus.publish(WorkflowEvent::decision(
            state.id.as_str(),
            stage.as_str(),
            outcome,
            rationale,
        ));
    }
}
