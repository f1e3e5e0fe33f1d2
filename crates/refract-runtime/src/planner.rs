//! Planner - builds the stage sequence for one run.
//!
//! The generation backend is asked for a structured plan; malformed or
//! missing output falls back to the deterministic shape. Planning never
//! aborts a run.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use refract_core::types::{Plan, StageKind, Target};
use refract_services::{GenerationService, PromptKind};

const MAX_PLAN_LOG_CHARS: usize = 2_000;

/// What the planner produced and why.
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: Plan,
    /// "model_plan" when the backend's plan was usable, "fallback_plan" otherwise
    pub outcome: &'static str,
    /// Step counts per stage kind, recorded as the planning decision
    pub rationale: String,
}

pub struct Planner {
    service: Arc<dyn GenerationService>,
    call_timeout: Duration,
}

impl Planner {
    pub fn new(service: Arc<dyn GenerationService>, call_timeout: Duration) -> Self {
        Self {
            service,
            call_timeout,
        }
    }

    /// Produce a plan. Guaranteed to succeed: backend failure, timeout, or
    /// malformed output all land on the deterministic fallback.
    pub async fn plan(&self, goal: &str, targets: &[Target], has_brand_context: bool) -> PlanOutcome {
        let input = json!({
            "goal": goal,
            "targets": targets.iter().map(Target::as_str).collect::<Vec<_>>(),
            "has_brand_context": has_brand_context,
        });

        let reply = match timeout(self.call_timeout, self.service.invoke(PromptKind::Plan, input))
            .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(error = %e, "plan call failed, using fallback plan");
                None
            }
            Err(_) => {
                warn!(timeout_secs = self.call_timeout.as_secs(), "plan call timed out, using fallback plan");
                None
            }
        };

        let parsed = reply.as_deref().and_then(|text| {
            debug!(reply_preview = %truncate_for_log(text, MAX_PLAN_LOG_CHARS), "raw plan reply");
            parse_plan(text, goal, targets)
        });

        let (plan, outcome) = match parsed {
            Some(plan) => (plan, "model_plan"),
            None => (Plan::fallback(goal, targets), "fallback_plan"),
        };

        let rationale = plan.stage_summary();
        info!(outcome, step_count = plan.steps.len(), %rationale, "plan produced");
        PlanOutcome {
            plan,
            outcome,
            rationale,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlanDraft {
    steps: Vec<StepDraft>,
}

#[derive(Debug, Deserialize)]
struct StepDraft {
    stage: String,
    #[serde(default)]
    target: Option<String>,
}

/// Parse a backend plan reply. Returns None on anything malformed:
/// non-JSON text, unknown stage names, unknown targets, per-target stages
/// without a target, or a plan missing generate/publish steps.
fn parse_plan(text: &str, goal: &str, targets: &[Target]) -> Option<Plan> {
    let json_str = extract_json(text)?;
    let draft: PlanDraft = serde_json::from_str(&json_str).ok()?;
    if draft.steps.is_empty() {
        return None;
    }

    let mut steps = Vec::with_capacity(draft.steps.len());
    let mut generated: Vec<Target> = Vec::new();
    for step in draft.steps {
        let stage = StageKind::parse_plannable(&step.stage)?;
        let target = match step.target {
            Some(name) => {
                let target = Target::new(name);
                if !targets.contains(&target) {
                    return None;
                }
                Some(target)
            }
            None => None,
        };

        match (stage, &target) {
            (StageKind::Generate | StageKind::Review, None) => return None,
            (StageKind::Generate, Some(t)) => generated.push(t.clone()),
            // A review can only score a draft that exists by then.
            (StageKind::Review, Some(t)) if !generated.contains(t) => return None,
            _ => {}
        }
        steps.push((stage, target));
    }

    let has_generate = steps.iter().any(|(s, _)| *s == StageKind::Generate);
    let has_publish = steps.iter().any(|(s, _)| *s == StageKind::Publish);
    if !has_generate || !has_publish {
        return None;
    }

    Some(Plan::new(goal, steps))
}

/// Slice the first balanced-looking JSON object out of a prose reply.
pub(crate) fn extract_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}

pub(crate) fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_services::MockGenerationService;

    fn targets() -> Vec<Target> {
        vec![Target::new("twitter"), Target::new("blog")]
    }

    #[test]
    fn test_model_plan_is_used_when_well_formed() {
        tokio_test::block_on(async {
            let reply = r#"Here is the plan:
{"steps":[
  {"stage":"ingest"},
  {"stage":"generate","target":"twitter"},
  {"stage":"review","target":"twitter"},
  {"stage":"generate","target":"blog"},
  {"stage":"review","target":"blog"},
  {"stage":"publish"}
]}"#;
            let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Plan, reply));
            let planner = Planner::new(mock, Duration::from_secs(5));

            let outcome = planner.plan("repurpose", &targets(), false).await;
            assert_eq!(outcome.outcome, "model_plan");
            assert_eq!(outcome.plan.steps.len(), 6);
            assert_eq!(outcome.plan.steps[0].stage, StageKind::Ingest);
        });
    }

    #[test]
    fn test_backend_failure_falls_back() {
        tokio_test::block_on(async {
            let mock =
                Arc::new(MockGenerationService::new().with_failing_kind(PromptKind::Plan));
            let planner = Planner::new(mock, Duration::from_secs(5));

            let outcome = planner.plan("repurpose", &targets(), false).await;
            assert_eq!(outcome.outcome, "fallback_plan");
            // ingest + (generate+review) per target + publish
            assert_eq!(outcome.plan.steps.len(), 6);
        });
    }

    #[test]
    fn test_non_json_reply_falls_back() {
        tokio_test::block_on(async {
            let mock = Arc::new(
                MockGenerationService::new()
                    .with_reply(PromptKind::Plan, "I would start by analyzing the content."),
            );
            let planner = Planner::new(mock, Duration::from_secs(5));
            let outcome = planner.plan("repurpose", &targets(), false).await;
            assert_eq!(outcome.outcome, "fallback_plan");
        });
    }

    #[test]
    fn test_unknown_stage_name_falls_back() {
        tokio_test::block_on(async {
            let reply = r#"{"steps":[{"stage":"deploy","target":"twitter"},{"stage":"publish"}]}"#;
            let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Plan, reply));
            let planner = Planner::new(mock, Duration::from_secs(5));
            let outcome = planner.plan("repurpose", &targets(), false).await;
            assert_eq!(outcome.outcome, "fallback_plan");
        });
    }

    #[test]
    fn test_unknown_target_falls_back() {
        tokio_test::block_on(async {
            let reply = r#"{"steps":[
              {"stage":"generate","target":"tiktok"},
              {"stage":"publish"}
            ]}"#;
            let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Plan, reply));
            let planner = Planner::new(mock, Duration::from_secs(5));
            let outcome = planner.plan("repurpose", &targets(), false).await;
            assert_eq!(outcome.outcome, "fallback_plan");
        });
    }

    #[test]
    fn test_review_before_generate_falls_back() {
        tokio_test::block_on(async {
            let reply = r#"{"steps":[
              {"stage":"review","target":"twitter"},
              {"stage":"generate","target":"twitter"},
              {"stage":"publish"}
            ]}"#;
            let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Plan, reply));
            let planner = Planner::new(mock, Duration::from_secs(5));
            let outcome = planner.plan("repurpose", &targets(), false).await;
            assert_eq!(outcome.outcome, "fallback_plan");
        });
    }

    #[test]
    fn test_plan_without_publish_falls_back() {
        tokio_test::block_on(async {
            let reply = r#"{"steps":[{"stage":"generate","target":"twitter"}]}"#;
            let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Plan, reply));
            let planner = Planner::new(mock, Duration::from_secs(5));
            let outcome = planner.plan("repurpose", &targets(), false).await;
            assert_eq!(outcome.outcome, "fallback_plan");
        });
    }

    #[test]
    fn test_extract_json_slices_prose() {
        assert_eq!(
            extract_json("noise {\"a\":1} trailing").as_deref(),
            Some("{\"a\":1}")
        );
        assert!(extract_json("no braces here").is_none());
        assert!(extract_json("} inverted {").is_none());
    }
}
