//! Ingest stage - one-time source analysis and enrichment.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::warn;

use refract_core::types::{IngestOutput, Sentiment, StageKind, WorkflowState};
use refract_services::{GenerationService, PromptKind};

use super::preview;

const MAX_THEMES: usize = 5;
const MAX_KEYWORDS: usize = 10;
const MAX_KEY_MESSAGES: usize = 3;
const MAX_CONTEXT_SNIPPET_CHARS: usize = 200;

pub struct IngestStage {
    service: Arc<dyn GenerationService>,
    call_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct IngestDraft {
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    audience: String,
    #[serde(default)]
    key_messages: Vec<String>,
}

impl IngestStage {
    pub fn new(service: Arc<dyn GenerationService>, call_timeout: Duration) -> Self {
        Self {
            service,
            call_timeout,
        }
    }

    /// Analyze the source once and store the read-only result on the state.
    /// On backend failure the raw source survives as the enriched text and
    /// the run continues.
    pub async fn run(&self, state: &mut WorkflowState) {
        let input = json!({
            "content": state.source_content,
            "brand": state.brand_profile.as_ref().map(|b| json!({
                "name": b.name,
                "tone": b.tone,
                "values": b.values,
                "audience": b.audience,
            })),
        });

        let reply = match timeout(self.call_timeout, self.service.invoke(PromptKind::Ingest, input))
            .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(error = %e, "ingest analysis failed, degrading to raw source");
                None
            }
            Err(_) => {
                warn!("ingest analysis timed out, degrading to raw source");
                None
            }
        };

        let draft = reply
            .as_deref()
            .and_then(crate::planner::extract_json)
            .and_then(|json_str| serde_json::from_str::<IngestDraft>(&json_str).ok());

        let output = match draft {
            Some(mut draft) => {
                draft.themes.truncate(MAX_THEMES);
                draft.keywords.truncate(MAX_KEYWORDS);
                draft.key_messages.truncate(MAX_KEY_MESSAGES);
                let sentiment = Sentiment::parse(&draft.sentiment);
                let enriched = build_enriched(state, &draft, sentiment);
                IngestOutput {
                    themes: draft.themes,
                    keywords: draft.keywords,
                    sentiment,
                    audience: draft.audience,
                    key_messages: draft.key_messages,
                    enriched,
                    degraded: false,
                }
            }
            None => {
                state.record_error(StageKind::Ingest, "analysis unavailable, using raw source");
                IngestOutput {
                    themes: Vec::new(),
                    keywords: Vec::new(),
                    sentiment: Sentiment::Neutral,
                    audience: String::new(),
                    key_messages: Vec::new(),
                    enriched: state.source_content.clone(),
                    degraded: true,
                }
            }
        };

        state.record_trace(
            StageKind::Ingest,
            format!("source content ({} chars)", state.source_content.chars().count()),
            if output.degraded {
                "degraded: raw source only".to_string()
            } else {
                format!(
                    "themes={} keywords={} sentiment={:?}",
                    output.themes.len(),
                    output.keywords.len(),
                    output.sentiment
                )
            },
            format!("enriched text ({} chars)", output.enriched.chars().count()),
        );
        state.ingest = Some(output);
    }
}

fn build_enriched(state: &WorkflowState, draft: &IngestDraft, sentiment: Sentiment) -> String {
    let mut enriched = state.source_content.clone();

    enriched.push_str("\n\n## Analysis\n");
    enriched.push_str(&format!("Themes: {}\n", draft.themes.join(", ")));
    enriched.push_str(&format!("Keywords: {}\n", draft.keywords.join(", ")));
    enriched.push_str(&format!("Sentiment: {:?}\n", sentiment));
    if !draft.audience.is_empty() {
        enriched.push_str(&format!("Audience: {}\n", draft.audience));
    }
    if !draft.key_messages.is_empty() {
        enriched.push_str(&format!("Key messages: {}\n", draft.key_messages.join("; ")));
    }

    if let Some(context) = &state.identity_context {
        if context.semantic_found {
            enriched.push_str("\n## Retrieved Context\n");
            for hit in &context.related {
                enriched.push_str(&format!(
                    "- {}\n",
                    preview(&hit.text, MAX_CONTEXT_SNIPPET_CHARS)
                ));
            }
        }
        if let Some(identity) = &context.identity {
            if !identity.beliefs.is_empty() || !identity.stances.is_empty() {
                enriched.push_str("\n## Identity\n");
                if !identity.beliefs.is_empty() {
                    enriched.push_str(&format!("Beliefs: {}\n", identity.beliefs.join("; ")));
                }
                if !identity.stances.is_empty() {
                    enriched.push_str(&format!("Stances: {}\n", identity.stances.join("; ")));
                }
            }
        }
    }

    enriched.push_str("\n## Brand Guidelines\n");
    match state
        .brand_profile
        .as_ref()
        .and_then(|b| b.guidelines.as_deref())
    {
        Some(guidelines) => enriched.push_str(guidelines),
        None => enriched.push_str("No brand guidelines provided."),
    }

    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::types::{BrandProfile, Target};
    use refract_services::MockGenerationService;

    fn make_state(brand: Option<BrandProfile>) -> WorkflowState {
        WorkflowState::new(
            "repurpose",
            "We are shipping realtime sync across all plans next month.",
            brand,
            vec![Target::new("twitter")],
            3,
        )
    }

    const ANALYSIS: &str = r#"{"themes":["sync","launch"],"keywords":["realtime","sync","plans"],"sentiment":"positive","audience":"saas teams","key_messages":["sync ships next month","all plans included"]}"#;

    #[tokio::test]
    async fn test_ingest_parses_analysis_and_enriches() {
        let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Ingest, ANALYSIS));
        let stage = IngestStage::new(mock, Duration::from_secs(5));
        let mut state = make_state(None);

        stage.run(&mut state).await;

        let output = state.ingest.as_ref().unwrap();
        assert!(!output.degraded);
        assert_eq!(output.themes, vec!["sync", "launch"]);
        assert_eq!(output.sentiment, Sentiment::Positive);
        assert!(output.enriched.contains("## Analysis"));
        assert!(output.enriched.contains("No brand guidelines provided."));
        assert!(output.enriched.starts_with(&state.source_content));
    }

    #[tokio::test]
    async fn test_ingest_degrades_to_raw_source_on_failure() {
        let mock = Arc::new(MockGenerationService::new().with_failing_kind(PromptKind::Ingest));
        let stage = IngestStage::new(mock, Duration::from_secs(5));
        let mut state = make_state(None);

        stage.run(&mut state).await;

        let output = state.ingest.as_ref().unwrap();
        assert!(output.degraded);
        assert!(output.themes.is_empty());
        assert_eq!(output.enriched, state.source_content);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].stage, StageKind::Ingest);
    }

    #[tokio::test]
    async fn test_ingest_clamps_oversized_lists() {
        let reply = r#"{"themes":["a","b","c","d","e","f","g"],"keywords":["k1","k2","k3","k4","k5","k6","k7","k8","k9","k10","k11","k12"],"sentiment":"neutral","audience":"","key_messages":["m1","m2","m3","m4"]}"#;
        let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Ingest, reply));
        let stage = IngestStage::new(mock, Duration::from_secs(5));
        let mut state = make_state(None);

        stage.run(&mut state).await;

        let output = state.ingest.as_ref().unwrap();
        assert_eq!(output.themes.len(), 5);
        assert_eq!(output.keywords.len(), 10);
        assert_eq!(output.key_messages.len(), 3);
    }

    #[tokio::test]
    async fn test_ingest_includes_brand_guidelines_when_present() {
        let brand = BrandProfile {
            name: "acme".to_string(),
            guidelines: Some("Always lead with the customer outcome.".to_string()),
            ..BrandProfile::default()
        };
        let mock = Arc::new(MockGenerationService::new().with_reply(PromptKind::Ingest, ANALYSIS));
        let stage = IngestStage::new(mock, Duration::from_secs(5));
        let mut state = make_state(Some(brand));

        stage.run(&mut state).await;

        let output = state.ingest.as_ref().unwrap();
        assert!(output
            .enriched
            .contains("Always lead with the customer outcome."));
    }
}
