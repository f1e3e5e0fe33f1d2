//! Final result definitions
//!
//! WorkflowResult is the one value callers receive. Its shape is never
//! partial: every requested target gets a variant entry even when the run
//! failed before reaching it.

use serde::{Deserialize, Serialize};

use super::{ImageOutput, Target, WorkflowStatus};

/// Per-target outcome entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub target: Target,
    /// Generated content, or an explicit fallback placeholder when
    /// generation never produced a draft for this target
    pub content: String,
    pub score: f32,
    pub published: bool,
    /// True when automatic remediation was abandoned for this target
    pub escalated: bool,
    /// True when `content` is the fallback placeholder
    pub fallback: bool,
    #[serde(default)]
    pub image: Option<ImageOutput>,
}

/// Computed quality metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    /// passed targets / requested targets * 100
    pub hit_rate: f32,
    /// targets needing zero reflection cycles / requested targets * 100
    pub automation_rate: f32,
    pub published_count: usize,
    pub avg_consistency_score: f32,
    pub processing_time_seconds: f64,
}

/// Complete outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub variants: Vec<VariantResult>,
    pub kpi: KpiSummary,
}

impl WorkflowResult {
    pub fn variant(&self, target: &Target) -> Option<&VariantResult> {
        self.variants.iter().find(|v| &v.target == target)
    }
}
