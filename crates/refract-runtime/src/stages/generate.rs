//! Generate stage - drafts one platform variant.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;
use tracing::warn;

use refract_config::TargetProfile;
use refract_core::types::{
    GenerateMetadata, GenerateOutput, ReflectionResult, StageKind, Target, WorkflowState,
};
use refract_services::{GenerationService, PromptKind};

pub struct GenerateStage {
    service: Arc<dyn GenerationService>,
    call_timeout: Duration,
}

impl GenerateStage {
    pub fn new(service: Arc<dyn GenerationService>, call_timeout: Duration) -> Self {
        Self {
            service,
            call_timeout,
        }
    }

    /// Draft content for one target, folding in an optional remediation
    /// hint from a prior reflection pass. Output is always clipped to the
    /// target's maximum before it leaves this stage; total backend failure
    /// degrades to a naive truncation of the raw source.
    pub async fn run(
        &self,
        state: &mut WorkflowState,
        target: &Target,
        profile: &TargetProfile,
        hint: Option<&ReflectionResult>,
    ) {
        let base = state
            .ingest
            .as_ref()
            .map(|i| i.enriched.clone())
            .unwrap_or_else(|| state.source_content.clone());

        let input = json!({
            "content": base,
            "target": target.as_str(),
            "style": profile.style,
            "max_chars": profile.max_chars,
            "brand": state.brand_profile.as_ref().map(|b| json!({
                "tone": b.tone,
                "values": b.values,
            })),
            "remediation": hint.map(|r| json!({
                "strategy": r.strategy,
                "focus_areas": r.focus_areas,
            })),
        });

        let reply = match timeout(
            self.call_timeout,
            self.service.invoke(PromptKind::Generate, input),
        )
        .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(target = %target, error = %e, "generation failed, falling back to source truncation");
                None
            }
            Err(_) => {
                warn!(target = %target, "generation timed out, falling back to source truncation");
                None
            }
        };

        let (raw, fell_back) = match reply {
            Some(text) => (text, false),
            None => {
                state.record_error(
                    StageKind::Generate,
                    format!("generation unavailable for {}, truncating source", target),
                );
                (state.source_content.clone(), true)
            }
        };

        let (content, truncated) = clip_to(&raw, profile.max_chars);
        let length = content.chars().count();
        let structural_tags = structural_tags(&content);

        state.record_trace(
            StageKind::Generate,
            format!(
                "target={} base={} chars, hint={}",
                target,
                base.chars().count(),
                hint.is_some()
            ),
            if fell_back {
                "fallback: source truncation".to_string()
            } else {
                format!("drafted {} chars, truncated={}", length, truncated)
            },
            format!("draft ({} chars)", length),
        );

        state.drafts.insert(
            target.clone(),
            GenerateOutput {
                target: target.clone(),
                content,
                metadata: GenerateMetadata {
                    length,
                    truncated,
                    structural_tags,
                },
            },
        );
    }
}

/// Clip to a character ceiling, flagging whether anything was cut.
fn clip_to(text: &str, max_chars: usize) -> (String, bool) {
    let count = text.chars().count();
    if count <= max_chars {
        (text.to_string(), false)
    } else {
        (text.chars().take(max_chars).collect(), true)
    }
}

fn structural_tags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();
    if content.contains("\n\n") {
        tags.push("multi_paragraph".to_string());
    }
    if content.split_whitespace().any(|w| w.starts_with('#') && w.len() > 1) {
        tags.push("hashtags".to_string());
    }
    if content.contains("http://") || content.contains("https://") {
        tags.push("links".to_string());
    }
    if tags.is_empty() {
        tags.push("plain_text".to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_services::MockGenerationService;

    fn make_state() -> WorkflowState {
        WorkflowState::new(
            "repurpose",
            "Long-form announcement about our realtime sync feature shipping to every plan next month.",
            None,
            vec![Target::new("twitter")],
            3,
        )
    }

    fn profile(max_chars: usize) -> TargetProfile {
        TargetProfile {
            max_chars,
            min_chars: 10,
            style: "punchy".to_string(),
            require_paragraph_breaks: false,
        }
    }

    #[tokio::test]
    async fn test_generate_stores_draft_for_target() {
        let mock = Arc::new(
            MockGenerationService::new()
                .with_reply(PromptKind::Generate, "Realtime sync ships next month. #launch"),
        );
        let stage = GenerateStage::new(mock, Duration::from_secs(5));
        let mut state = make_state();
        let target = Target::new("twitter");

        stage.run(&mut state, &target, &profile(280), None).await;

        let draft = state.drafts.get(&target).unwrap();
        assert!(draft.content.contains("Realtime sync"));
        assert!(!draft.metadata.truncated);
        assert!(draft.metadata.structural_tags.contains(&"hashtags".to_string()));
    }

    #[tokio::test]
    async fn test_oversized_output_is_clipped_and_flagged() {
        let long_reply = "word ".repeat(200);
        let mock =
            Arc::new(MockGenerationService::new().with_reply(PromptKind::Generate, long_reply));
        let stage = GenerateStage::new(mock, Duration::from_secs(5));
        let mut state = make_state();
        let target = Target::new("twitter");

        stage.run(&mut state, &target, &profile(280), None).await;

        let draft = state.drafts.get(&target).unwrap();
        assert_eq!(draft.content.chars().count(), 280);
        assert!(draft.metadata.truncated);
        assert_eq!(draft.metadata.length, 280);
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_to_source_truncation() {
        let mock = Arc::new(MockGenerationService::new().with_failing_kind(PromptKind::Generate));
        let stage = GenerateStage::new(mock, Duration::from_secs(5));
        let mut state = make_state();
        let target = Target::new("twitter");

        stage.run(&mut state, &target, &profile(40), None).await;

        let draft = state.drafts.get(&target).unwrap();
        assert!(!draft.content.is_empty());
        assert_eq!(draft.content.chars().count(), 40);
        assert!(state.source_content.starts_with(&draft.content));
        assert_eq!(state.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_overwrites_previous_draft() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_reply(PromptKind::Generate, "first draft about sync launch");
        mock.push_reply(PromptKind::Generate, "second draft about sync launch, improved");
        let stage = GenerateStage::new(mock, Duration::from_secs(5));
        let mut state = make_state();
        let target = Target::new("twitter");

        stage.run(&mut state, &target, &profile(280), None).await;
        let hint = ReflectionResult {
            can_remediate: true,
            root_cause: "too generic".to_string(),
            strategy: "add concrete detail".to_string(),
            focus_areas: vec!["specificity".to_string()],
        };
        stage
            .run(&mut state, &target, &profile(280), Some(&hint))
            .await;

        assert_eq!(state.drafts.len(), 1);
        assert!(state.drafts.get(&target).unwrap().content.contains("second draft"));
    }
}
