//! Result/KPI builder - derives the caller-facing outcome from run state.
//!
//! Always produces a complete result: every requested target gets a
//! variant entry, even when the run failed before reaching it.

use chrono::Utc;

use refract_core::types::{KpiSummary, VariantResult, WorkflowResult, WorkflowState};

pub fn build_result(state: &WorkflowState) -> WorkflowResult {
    let target_count = state.targets.len();

    let variants: Vec<VariantResult> = state
        .targets
        .iter()
        .map(|target| {
            let published = state.published.contains(target);
            let (content, fallback) = match state.drafts.get(target) {
                Some(draft) => (draft.content.clone(), false),
                None => (
                    format!("content generation did not complete for target '{}'", target),
                    true,
                ),
            };
            VariantResult {
                target: target.clone(),
                content,
                score: state.reviews.get(target).map(|r| r.score).unwrap_or(0.0),
                published,
                escalated: state.escalated.contains(target),
                fallback,
                image: if published {
                    state.image_generation.clone()
                } else {
                    None
                },
            }
        })
        .collect();

    let published_count = state.published.len();
    let zero_reflection_targets = state
        .targets
        .iter()
        .filter(|t| state.reflection_count(t) == 0)
        .count();
    let reviewed: Vec<f32> = state.reviews.values().map(|r| r.score).collect();

    let kpi = KpiSummary {
        hit_rate: rate(published_count, target_count),
        automation_rate: rate(zero_reflection_targets, target_count),
        published_count,
        avg_consistency_score: if reviewed.is_empty() {
            0.0
        } else {
            reviewed.iter().sum::<f32>() / reviewed.len() as f32
        },
        processing_time_seconds: (Utc::now() - state.started_at).num_milliseconds() as f64
            / 1000.0,
    };

    WorkflowResult {
        workflow_id: state.id.to_string(),
        status: state.status,
        variants,
        kpi,
    }
}

fn rate(count: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        count as f32 / total as f32 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::types::{
        GenerateMetadata, GenerateOutput, ReviewMethod, ReviewOutput, StageKind, Target,
        WorkflowStatus,
    };

    fn state_with_two_targets() -> WorkflowState {
        WorkflowState::new(
            "repurpose",
            "source content",
            None,
            vec![Target::new("twitter"), Target::new("blog")],
            3,
        )
    }

    fn add_draft(state: &mut WorkflowState, target: &Target, content: &str, score: f32) {
        state.drafts.insert(
            target.clone(),
            GenerateOutput {
                target: target.clone(),
                content: content.to_string(),
                metadata: GenerateMetadata {
                    length: content.chars().count(),
                    truncated: false,
                    structural_tags: vec![],
                },
            },
        );
        state.reviews.insert(
            target.clone(),
            ReviewOutput {
                target: target.clone(),
                score,
                passed: score >= 80.0,
                method: ReviewMethod::WeightedCriteria,
                criteria: vec![],
            },
        );
    }

    #[test]
    fn test_every_target_gets_a_variant_even_without_a_draft() {
        let mut state = state_with_two_targets();
        let twitter = Target::new("twitter");
        add_draft(&mut state, &twitter, "published draft", 90.0);
        state.mark_published(&twitter);
        state.set_status(WorkflowStatus::Failed);

        let result = build_result(&state);
        assert_eq!(result.variants.len(), 2);

        let blog = result.variant(&Target::new("blog")).unwrap();
        assert!(blog.fallback);
        assert!(!blog.content.is_empty());
        assert!(!blog.published);
        assert_eq!(blog.score, 0.0);

        let twitter_variant = result.variant(&twitter).unwrap();
        assert!(!twitter_variant.fallback);
        assert!(twitter_variant.published);
    }

    #[test]
    fn test_hit_rate_and_published_count() {
        let mut state = state_with_two_targets();
        let twitter = Target::new("twitter");
        let blog = Target::new("blog");
        add_draft(&mut state, &twitter, "draft a", 92.0);
        add_draft(&mut state, &blog, "draft b", 70.0);
        state.mark_published(&twitter);
        state.mark_escalated(&blog);

        let result = build_result(&state);
        assert_eq!(result.kpi.published_count, 1);
        assert!((result.kpi.hit_rate - 50.0).abs() < 0.01);
        assert!((result.kpi.avg_consistency_score - 81.0).abs() < 0.01);
    }

    #[test]
    fn test_automation_rate_counts_zero_reflection_targets() {
        let mut state = state_with_two_targets();
        let twitter = Target::new("twitter");
        state.record_decision(StageKind::Reflect, Some(twitter), "retry", "too short");

        let result = build_result(&state);
        // blog needed no reflection; twitter did.
        assert!((result.kpi.automation_rate - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_target_list_yields_zero_rates() {
        let state = WorkflowState::new("goal", "source", None, vec![], 3);
        let result = build_result(&state);
        assert_eq!(result.kpi.hit_rate, 0.0);
        assert_eq!(result.kpi.automation_rate, 0.0);
        assert!(result.variants.is_empty());
    }
}
