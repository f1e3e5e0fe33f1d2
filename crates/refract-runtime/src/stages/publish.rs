//! Publish stage - formats approved variants for delivery.
//!
//! No network delivery happens here: the stage produces the final artifact
//! plus a synthetic receipt and records an audit entry per target.

use chrono::Utc;

use refract_core::types::{PublishOutput, PublishReceipt, StageKind, Target, WorkflowState};

pub struct PublishStage;

impl PublishStage {
    pub fn new() -> Self {
        Self
    }

    /// Format every verification-passed target, attaching the enrichment
    /// image when it completed.
    pub fn run(&self, state: &mut WorkflowState) -> Vec<PublishOutput> {
        let image = state.image_generation.clone();
        let approved: Vec<Target> = state.published.clone();
        let mut outputs = Vec::with_capacity(approved.len());

        for target in approved {
            let Some(draft) = state.drafts.get(&target) else {
                // An approved target always has a draft; guard anyway.
                state.record_error(
                    StageKind::Publish,
                    format!("approved target {} has no draft", target),
                );
                continue;
            };

            let payload = format_payload(&draft.content);
            let receipt = PublishReceipt {
                id: uuid::Uuid::new_v4().to_string(),
                target: target.clone(),
                published_at: Utc::now(),
            };

            state.record_trace(
                StageKind::Publish,
                format!("target={} draft ({} chars)", target, draft.content.chars().count()),
                format!("formatted payload, image={}", image.is_some()),
                format!("receipt {}", receipt.id),
            );
            state.record_decision(
                StageKind::Publish,
                Some(target.clone()),
                "published",
                format!("receipt {}", receipt.id),
            );

            outputs.push(PublishOutput {
                target,
                payload,
                receipt,
                image: image.clone(),
            });
        }

        outputs
    }
}

impl Default for PublishStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery formatting: trim outer whitespace and collapse runs of blank
/// lines left behind by generation backends.
fn format_payload(content: &str) -> String {
    let mut payload = String::with_capacity(content.len());
    let mut blank_run = 0usize;
    for line in content.trim().lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        payload.push_str(line.trim_end());
        payload.push('\n');
    }
    payload.trim_end().to_string()
}
