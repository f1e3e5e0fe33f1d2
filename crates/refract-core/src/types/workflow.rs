//! Workflow state definitions
//!
//! WorkflowState is the mutable record threaded through one run. It is owned
//! exclusively by the orchestrator for that run's lifetime and never shared
//! across runs; the background image task writes only to its isolated
//! `image_generation` slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::store::{IdentityRecord, SemanticHit};

use super::{
    BrandProfile, GenerateOutput, ImageOutput, IngestOutput, Plan, ReviewOutput, StageKind, Target,
};

/// Opaque identifier correlating all events for one run.
///
/// Stringified once at creation and never re-typed or reformatted
/// downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Run-level state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Planning,
    Executing,
    Reflecting,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Planning => "planning",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Reflecting => "reflecting",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}

/// Append-only error log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub stage: StageKind,
    pub message: String,
    pub retry_count_at_time: u32,
    pub timestamp: DateTime<Utc>,
}

/// Append-only decision log entry; feeds the reflector's context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub stage: StageKind,
    #[serde(default)]
    pub target: Option<Target>,
    pub outcome: String,
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

/// Full-observability trace entry: what a stage received, decided, and
/// passed on. Never trimmed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub stage: StageKind,
    pub received: String,
    pub decided: String,
    pub passed_on: String,
}

/// Merged semantic + graph retrieval grounding a run in prior brand
/// history. Every field is optional; absence never blocks the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityContext {
    #[serde(default)]
    pub related: Vec<SemanticHit>,
    #[serde(default)]
    pub identity: Option<IdentityRecord>,
    /// Whether the similarity query returned anything
    pub semantic_found: bool,
    /// Whether the graph query returned an identity record
    pub graph_found: bool,
}

/// The mutable record for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: WorkflowId,
    pub goal: String,
    pub source_content: String,
    pub brand_profile: Option<BrandProfile>,
    /// Ordered target set, duplicates removed at construction
    pub targets: Vec<Target>,
    /// Immutable once set for a run
    pub plan: Plan,
    /// Index into `plan`; advances only forward
    pub cursor: usize,
    pub identity_context: Option<IdentityContext>,
    /// Produced once, read-only afterward
    pub ingest: Option<IngestOutput>,
    /// Latest draft per target, overwritten on retry
    pub drafts: HashMap<Target, GenerateOutput>,
    /// Latest review per target, overwritten on retry
    pub reviews: HashMap<Target, ReviewOutput>,
    /// Targets that passed verification
    pub published: Vec<Target>,
    /// Targets abandoned after exhausting remediation
    pub escalated: Vec<Target>,
    pub errors: Vec<ErrorEntry>,
    pub decisions: Vec<DecisionEntry>,
    /// Retry count for the active target
    pub retry_count: u32,
    pub max_retries: u32,
    pub trace: Vec<TraceEntry>,
    pub status: WorkflowStatus,
    /// Written only by the background enrichment task, read at publish time
    pub image_generation: Option<ImageOutput>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(
        goal: impl Into<String>,
        source_content: impl Into<String>,
        brand_profile: Option<BrandProfile>,
        targets: Vec<Target>,
        max_retries: u32,
    ) -> Self {
        let goal = goal.into();
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            plan: Plan::new(goal.clone(), Vec::new()),
            goal,
            source_content: source_content.into(),
            brand_profile,
            targets: Target::dedup(targets),
            cursor: 0,
            identity_context: None,
            ingest: None,
            drafts: HashMap::new(),
            reviews: HashMap::new(),
            published: Vec::new(),
            escalated: Vec::new(),
            errors: Vec::new(),
            decisions: Vec::new(),
            retry_count: 0,
            max_retries,
            trace: Vec::new(),
            status: WorkflowStatus::Planning,
            image_generation: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.touch();
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = plan;
        self.touch();
    }

    /// Reset the per-target retry counter when the loop advances to a new
    /// target.
    pub fn begin_target(&mut self, _target: &Target) {
        self.retry_count = 0;
        self.touch();
    }

    pub fn bump_retry(&mut self) {
        self.retry_count += 1;
        self.touch();
    }

    pub fn record_error(&mut self, stage: StageKind, message: impl Into<String>) {
        self.errors.push(ErrorEntry {
            stage,
            message: message.into(),
            retry_count_at_time: self.retry_count,
            timestamp: Utc::now(),
        });
        self.touch();
    }

    pub fn record_decision(
        &mut self,
        stage: StageKind,
        target: Option<Target>,
        outcome: impl Into<String>,
        rationale: impl Into<String>,
    ) {
        self.decisions.push(DecisionEntry {
            stage,
            target,
            outcome: outcome.into(),
            rationale: rationale.into(),
            timestamp: Utc::now(),
        });
        self.touch();
    }

    pub fn record_trace(
        &mut self,
        stage: StageKind,
        received: impl Into<String>,
        decided: impl Into<String>,
        passed_on: impl Into<String>,
    ) {
        self.trace.push(TraceEntry {
            stage,
            received: received.into(),
            decided: decided.into(),
            passed_on: passed_on.into(),
        });
        self.touch();
    }

    pub fn mark_published(&mut self, target: &Target) {
        if !self.published.contains(target) {
            self.published.push(target.clone());
        }
        self.touch();
    }

    pub fn mark_escalated(&mut self, target: &Target) {
        if !self.escalated.contains(target) {
            self.escalated.push(target.clone());
        }
        self.touch();
    }

    /// Decision entries recorded for one target.
    pub fn decisions_for(&self, target: &Target) -> Vec<&DecisionEntry> {
        self.decisions
            .iter()
            .filter(|d| d.target.as_ref() == Some(target))
            .collect()
    }

    /// How many reflection passes a target needed.
    pub fn reflection_count(&self, target: &Target) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.stage == StageKind::Reflect && d.target.as_ref() == Some(target))
            .count()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_state() -> WorkflowState {
        WorkflowState::new(
            "repurpose announcement",
            "We are launching a new product line next week.",
            None,
            vec![Target::new("twitter"), Target::new("blog")],
            3,
        )
    }

    #[test]
    fn test_new_state_dedups_targets_and_starts_planning() {
        let state = WorkflowState::new(
            "goal",
            "content",
            None,
            vec![Target::new("twitter"), Target::new("Twitter")],
            3,
        );
        assert_eq!(state.targets.len(), 1);
        assert_eq!(state.status, WorkflowStatus::Planning);
        assert_eq!(state.retry_count, 0);
        assert!(!state.id.as_str().is_empty());
    }

    #[test]
    fn test_begin_target_resets_retry_count() {
        let mut state = make_state();
        state.bump_retry();
        state.bump_retry();
        assert_eq!(state.retry_count, 2);

        state.begin_target(&Target::new("blog"));
        assert_eq!(state.retry_count, 0);
    }

    #[test]
    fn test_error_entry_captures_retry_count_at_time() {
        let mut state = make_state();
        state.bump_retry();
        state.record_error(StageKind::Verify, "length below minimum");

        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].retry_count_at_time, 1);
        assert_eq!(state.errors[0].stage, StageKind::Verify);
    }

    #[test]
    fn test_reflection_count_scoped_to_target() {
        let mut state = make_state();
        let twitter = Target::new("twitter");
        let blog = Target::new("blog");
        state.record_decision(StageKind::Reflect, Some(twitter.clone()), "retry", "too short");
        state.record_decision(StageKind::Reflect, Some(twitter.clone()), "retry", "still short");
        state.record_decision(StageKind::Review, Some(blog.clone()), "passed", "score 91");

        assert_eq!(state.reflection_count(&twitter), 2);
        assert_eq!(state.reflection_count(&blog), 0);
    }

    #[test]
    fn test_mark_published_is_idempotent() {
        let mut state = make_state();
        let target = Target::new("twitter");
        state.mark_published(&target);
        state.mark_published(&target);
        assert_eq!(state.published.len(), 1);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(!WorkflowStatus::Reflecting.is_terminal());
    }
}
