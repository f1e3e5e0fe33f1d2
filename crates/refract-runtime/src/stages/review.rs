//! Review stage - brand consistency scoring.
//!
//! Primary path: weighted five-criteria scoring via the generation backend.
//! Fallback path: embedding similarity against the brand reference text (or
//! a generic professional reference) - used when the primary call fails or
//! returns unparseable output, and always when no brand profile exists.
//! Either way the output carries a numeric score and a boolean verdict.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, warn};

use refract_core::store::SemanticStore;
use refract_core::types::{
    CriterionScore, ReviewMethod, ReviewOutput, StageKind, Target, WorkflowState,
};
use refract_services::{GenerationService, PromptKind};
use refract_stores::cosine_similarity;

/// Scoring outcome before it is attached to a target.
struct ReviewVerdict {
    score: f32,
    passed: bool,
    method: ReviewMethod,
    criteria: Vec<CriterionScore>,
}

const GENERIC_REFERENCE: &str =
    "Professional, clear, and audience-aware writing that communicates one idea well, \
     stays specific, and respects the reader's time.";

const CRITERIA_WEIGHTS: [(&str, f32); 5] = [
    ("tone", 0.30),
    ("values", 0.25),
    ("keywords", 0.15),
    ("forbidden", 0.15),
    ("audience", 0.15),
];

pub struct ReviewStage {
    service: Arc<dyn GenerationService>,
    semantic: Arc<dyn SemanticStore>,
    call_timeout: Duration,
    score_threshold: f32,
}

#[derive(Debug, Deserialize)]
struct ReviewDraft {
    tone: f32,
    values: f32,
    keywords: f32,
    forbidden: f32,
    audience: f32,
}

impl ReviewStage {
    pub fn new(
        service: Arc<dyn GenerationService>,
        semantic: Arc<dyn SemanticStore>,
        call_timeout: Duration,
        score_threshold: f32,
    ) -> Self {
        Self {
            service,
            semantic,
            call_timeout,
            score_threshold,
        }
    }

    /// Score the latest draft for one target and store the review on the
    /// state. Never fails: every path lands on a numeric score.
    pub async fn run(&self, state: &mut WorkflowState, target: &Target) {
        let content = state
            .drafts
            .get(target)
            .map(|d| d.content.clone())
            .unwrap_or_default();

        let verdict = match &state.brand_profile {
            Some(brand) => {
                let brand_json = json!({
                    "name": brand.name,
                    "tone": brand.tone,
                    "values": brand.values,
                    "audience": brand.audience,
                    "required_keywords": brand.required_keywords,
                    "forbidden_words": brand.forbidden_words,
                });
                match self.weighted_review(&content, &brand_json).await {
                    Some(verdict) => verdict,
                    None => {
                        warn!(target = %target, "weighted review unavailable, using similarity fallback");
                        let reference = brand.reference_text();
                        self.similarity_review(&content, &reference).await
                    }
                }
            }
            // No brand profile: the weighted criteria have nothing to
            // score against, so the fallback is the primary path.
            None => self.similarity_review(&content, GENERIC_REFERENCE).await,
        };

        state.record_trace(
            StageKind::Review,
            format!("target={} draft ({} chars)", target, content.chars().count()),
            format!(
                "method={:?} score={:.1} passed={}",
                verdict.method, verdict.score, verdict.passed
            ),
            "review verdict".to_string(),
        );
        state.reviews.insert(
            target.clone(),
            ReviewOutput {
                target: target.clone(),
                score: verdict.score,
                passed: verdict.passed,
                method: verdict.method,
                criteria: verdict.criteria,
            },
        );
    }

    async fn weighted_review(
        &self,
        content: &str,
        brand_json: &serde_json::Value,
    ) -> Option<ReviewVerdict> {
        let input = json!({ "content": content, "brand": brand_json });
        let reply = match timeout(
            self.call_timeout,
            self.service.invoke(PromptKind::Review, input),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                debug!(error = %e, "review call failed");
                return None;
            }
            Err(_) => {
                debug!("review call timed out");
                return None;
            }
        };

        let json_str = crate::planner::extract_json(&reply)?;
        let draft: ReviewDraft = serde_json::from_str(&json_str).ok()?;

        let raw = [
            draft.tone,
            draft.values,
            draft.keywords,
            draft.forbidden,
            draft.audience,
        ];
        let criteria: Vec<CriterionScore> = CRITERIA_WEIGHTS
            .iter()
            .zip(raw.iter())
            .map(|((name, weight), score)| CriterionScore {
                name: name.to_string(),
                weight: *weight,
                score: score.clamp(0.0, 100.0),
            })
            .collect();
        let score: f32 = criteria.iter().map(|c| c.weight * c.score).sum();
        let score = score.clamp(0.0, 100.0);

        Some(ReviewVerdict {
            score,
            passed: score >= self.score_threshold,
            method: ReviewMethod::WeightedCriteria,
            criteria,
        })
    }

    async fn similarity_review(&self, content: &str, reference: &str) -> ReviewVerdict {
        let embeddings = async {
            let content_vec = timeout(self.call_timeout, self.semantic.embed(content))
                .await
                .ok()?
                .ok()?;
            let reference_vec = timeout(self.call_timeout, self.semantic.embed(reference))
                .await
                .ok()?
                .ok()?;
            Some((content_vec, reference_vec))
        }
        .await;

        let score = match embeddings {
            Some((content_vec, reference_vec)) => {
                let similarity = cosine_similarity(&content_vec, &reference_vec);
                (similarity.clamp(0.0, 1.0) * 100.0).clamp(0.0, 100.0)
            }
            None => {
                warn!("embedding unavailable, scoring zero");
                0.0
            }
        };

        ReviewVerdict {
            score,
            passed: score >= self.score_threshold,
            method: ReviewMethod::EmbeddingSimilarity,
            criteria: Vec::new(),
        }
    }
}
