//! Plan type definitions
//!
//! A Plan is the ordered sequence of stage invocations for one run. It is
//! immutable once attached to a workflow; when planning fails upstream a
//! deterministic fallback shape is used instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Target;

/// Closed set of stage kinds the engine knows how to interpret.
///
/// Plan steps only ever carry the plannable subset (ingest, generate,
/// review, publish); the remaining variants label trace/decision/error
/// entries produced by the surrounding machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Planning,
    Context,
    Ingest,
    Generate,
    Review,
    Verify,
    Reflect,
    Image,
    Publish,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Planning => "planning",
            StageKind::Context => "context",
            StageKind::Ingest => "ingest",
            StageKind::Generate => "generate",
            StageKind::Review => "review",
            StageKind::Verify => "verify",
            StageKind::Reflect => "reflect",
            StageKind::Image => "image",
            StageKind::Publish => "publish",
        }
    }

    /// Parse a stage name a planning backend may emit. Only plannable
    /// kinds are accepted; anything else is treated as malformed.
    pub fn parse_plannable(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ingest" => Some(StageKind::Ingest),
            "generate" => Some(StageKind::Generate),
            "review" => Some(StageKind::Review),
            "publish" => Some(StageKind::Publish),
            _ => None,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single step in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Position in the plan, assigned at construction
    pub ordinal: usize,
    /// Stage to invoke
    pub stage: StageKind,
    /// Target this step applies to; None for run-wide stages
    #[serde(default)]
    pub target: Option<Target>,
}

/// Ordered sequence of stage invocations for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Build a plan from (stage, target) pairs, assigning ordinals.
    pub fn new(goal: impl Into<String>, steps: Vec<(StageKind, Option<Target>)>) -> Self {
        Self {
            goal: goal.into(),
            steps: steps
                .into_iter()
                .enumerate()
                .map(|(ordinal, (stage, target))| PlanStep {
                    ordinal,
                    stage,
                    target,
                })
                .collect(),
        }
    }

    /// Deterministic fallback shape: one ingest, a generate+review pair per
    /// target, one publish. Used whenever upstream planning fails or returns
    /// malformed output, so a plan is always produced.
    pub fn fallback(goal: impl Into<String>, targets: &[Target]) -> Self {
        let mut steps = vec![(StageKind::Ingest, None)];
        for target in targets {
            steps.push((StageKind::Generate, Some(target.clone())));
            steps.push((StageKind::Review, Some(target.clone())));
        }
        steps.push((StageKind::Publish, None));
        Self::new(goal, steps)
    }

    /// Step counts per stage kind, e.g. "ingest=1 generate=2 review=2 publish=1".
    pub fn stage_summary(&self) -> String {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for step in &self.steps {
            *counts.entry(step.stage.as_str()).or_insert(0) += 1;
        }
        counts
            .iter()
            .map(|(stage, count)| format!("{}={}", stage, count))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_plan_shape() {
        let targets = vec![Target::new("twitter"), Target::new("blog")];
        let plan = Plan::fallback("repurpose launch post", &targets);

        assert_eq!(plan.steps.len(), 6);
        assert_eq!(plan.steps[0].stage, StageKind::Ingest);
        assert_eq!(plan.steps[1].stage, StageKind::Generate);
        assert_eq!(plan.steps[1].target.as_ref().unwrap(), &targets[0]);
        assert_eq!(plan.steps[2].stage, StageKind::Review);
        assert_eq!(plan.steps[5].stage, StageKind::Publish);
        // Ordinals are dense and ascending.
        for (i, step) in plan.steps.iter().enumerate() {
            assert_eq!(step.ordinal, i);
        }
    }

    #[test]
    fn test_stage_summary_counts_per_kind() {
        let plan = Plan::fallback("goal", &[Target::new("twitter")]);
        assert_eq!(
            plan.stage_summary(),
            "generate=1 ingest=1 publish=1 review=1"
        );
    }

    #[test]
    fn test_parse_plannable_rejects_unknown_kinds() {
        assert_eq!(StageKind::parse_plannable("Generate"), Some(StageKind::Generate));
        assert_eq!(StageKind::parse_plannable(" publish "), Some(StageKind::Publish));
        assert_eq!(StageKind::parse_plannable("reflect"), None);
        assert_eq!(StageKind::parse_plannable("deploy"), None);
    }
}
