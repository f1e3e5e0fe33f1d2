//! Reflector - remediation strategy and the retry/escalate decision.
//!
//! Given a verification failure, asks the generation backend for a root
//! cause and a remediation strategy; when that call fails, a heuristic
//! table pattern-matches the failure summary instead. The decision rule is
//! fixed: escalate once the retry budget is spent or the failure is
//! reported non-remediable, otherwise retry with the strategy as a hint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info};

use refract_core::types::{DecisionEntry, ReflectionResult, Target};
use refract_services::{GenerationService, PromptKind};

/// Outcome of one reflection pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Retry { strategy: String },
    Escalate { reason: String },
}

pub struct Reflector {
    service: Arc<dyn GenerationService>,
    call_timeout: Duration,
}

impl Reflector {
    pub fn new(service: Arc<dyn GenerationService>, call_timeout: Duration) -> Self {
        Self {
            service,
            call_timeout,
        }
    }

    /// Diagnose a verification failure. Always returns a usable result;
    /// backend failure lands on the heuristic table.
    pub async fn reflect(
        &self,
        failure_summary: &str,
        target: &Target,
        goal: &str,
        history: &[&DecisionEntry],
    ) -> ReflectionResult {
        let input = json!({
            "failure": failure_summary,
            "target": target.as_str(),
            "goal": goal,
            "history": history
                .iter()
                .map(|d| format!("{}: {} ({})", d.stage, d.outcome, d.rationale))
                .collect::<Vec<_>>(),
        });

        let reply = match timeout(
            self.call_timeout,
            self.service.invoke(PromptKind::Reflect, input),
        )
        .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                debug!(error = %e, "reflection call failed, using heuristic");
                None
            }
            Err(_) => {
                debug!("reflection call timed out, using heuristic");
                None
            }
        };

        let parsed = reply
            .as_deref()
            .and_then(crate::planner::extract_json)
            .and_then(|json_str| serde_json::from_str::<ReflectionResult>(&json_str).ok());

        match parsed {
            Some(result) => {
                info!(target = %target, can_remediate = result.can_remediate, "reflection produced");
                result
            }
            None => heuristic_reflection(failure_summary),
        }
    }

    /// Retry unless the budget is spent or the failure is non-remediable.
    pub fn decide(
        retry_count: u32,
        max_retries: u32,
        reflection: &ReflectionResult,
    ) -> RetryDecision {
        if !reflection.can_remediate {
            return RetryDecision::Escalate {
                reason: format!("non-remediable: {}", reflection.root_cause),
            };
        }
        if retry_count >= max_retries {
            return RetryDecision::Escalate {
                reason: format!("retry budget exhausted ({}/{})", retry_count, max_retries),
            };
        }
        RetryDecision::Retry {
            strategy: reflection.strategy.clone(),
        }
    }
}

/// Canned strategies keyed on the verifier's failure wording.
fn heuristic_reflection(failure_summary: &str) -> ReflectionResult {
    let lowered = failure_summary.to_lowercase();

    let (root_cause, strategy, focus) = if lowered.contains("below minimum") {
        (
            "content too short for the target",
            "add concrete detail and expand the core message",
            "length",
        )
    } else if lowered.contains("above maximum") {
        (
            "content too long for the target",
            "be concise; cut secondary points and keep one core message",
            "length",
        )
    } else if lowered.contains("forbidden phrases") {
        (
            "flagged phrasing present",
            "avoid the flagged phrases entirely and rephrase those claims",
            "phrasing",
        )
    } else if lowered.contains("code fence") {
        (
            "formatting artifacts leaked into the output",
            "emit plain text only, without markdown fences or wrappers",
            "formatting",
        )
    } else if lowered.contains("score") {
        (
            "draft reads off-brand",
            "align tone and keywords to the brand profile",
            "brand_alignment",
        )
    } else {
        (
            "unclassified verification failure",
            "regenerate with closer attention to the stated constraints",
            "general",
        )
    };

    ReflectionResult {
        can_remediate: true,
        root_cause: root_cause.to_string(),
        strategy: strategy.to_string(),
        focus_areas: vec![focus.to_string()],
    }
}
