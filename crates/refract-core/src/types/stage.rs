//! Stage output definitions
//!
//! Every stage hands downstream a closed, tagged result type. Downstream
//! code cannot silently read a field a stage never produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Target;

/// Sentiment classification from the ingest analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

/// Output of the ingest stage. Produced exactly once per run, read-only
/// afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutput {
    pub themes: Vec<String>,
    pub keywords: Vec<String>,
    pub sentiment: Sentiment,
    pub audience: String,
    pub key_messages: Vec<String>,
    /// Source content concatenated with analysis, retrieved context, and
    /// brand guidelines (or a stated absence of them).
    pub enriched: String,
    /// True when the analysis backend failed and only the raw source
    /// content survived into `enriched`.
    pub degraded: bool,
}

/// Metadata attached to each generated draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateMetadata {
    pub length: usize,
    pub truncated: bool,
    pub structural_tags: Vec<String>,
}

/// Output of one generate invocation for one target. Content is always
/// clipped to the target's maximum before it leaves the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOutput {
    pub target: Target,
    pub content: String,
    pub metadata: GenerateMetadata,
}

/// How the review score was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMethod {
    /// Weighted five-criteria consistency scoring via the generation backend
    WeightedCriteria,
    /// Embedding-similarity fallback against brand (or generic) reference text
    EmbeddingSimilarity,
}

/// One weighted criterion inside a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub name: String,
    pub weight: f32,
    pub score: f32,
}

/// Output of one review invocation for one target. Always carries a numeric
/// score and a boolean verdict, whichever path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutput {
    pub target: Target,
    /// Overall consistency score in 0..=100
    pub score: f32,
    pub passed: bool,
    pub method: ReviewMethod,
    #[serde(default)]
    pub criteria: Vec<CriterionScore>,
}

/// Image produced by the background enrichment task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOutput {
    pub url: String,
    pub provider: String,
    /// True when the image is a placeholder rather than a synthesized asset
    pub placeholder: bool,
}

impl ImageOutput {
    /// Terminal fallback of the enrichment chain; always available,
    /// requires no provider.
    pub fn emergency() -> Self {
        Self {
            url: "data:,image-unavailable".to_string(),
            provider: "emergency".to_string(),
            placeholder: true,
        }
    }
}

/// Synthetic receipt recorded when a variant is formatted for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub id: String,
    pub target: Target,
    pub published_at: DateTime<Utc>,
}

/// Delivery-ready payload for one published target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutput {
    pub target: Target,
    pub payload: String,
    pub receipt: PublishReceipt,
    #[serde(default)]
    pub image: Option<ImageOutput>,
}

/// Remediation advice produced by one reflection pass. Consumed once by the
/// next generate call for the same target, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionResult {
    pub can_remediate: bool,
    pub root_cause: String,
    pub strategy: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}
