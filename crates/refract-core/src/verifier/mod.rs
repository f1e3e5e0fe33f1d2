//! Verifier - the deterministic quality gate
//!
//! Runs independently of the review stage's subjective score, on the same
//! candidate content. Hard checks block; soft checks are advisory and only
//! surface in the summary. The separation keeps a single inflated
//! subjective score from masking a structurally broken output.
//!
//! `verify` is a pure function: identical candidate and rules yield an
//! identical result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed content length window for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBounds {
    pub min: usize,
    pub max: usize,
}

/// Rule set the gate evaluates one candidate against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRules {
    pub length: LengthBounds,
    #[serde(default)]
    pub required_keywords: Vec<String>,
    /// When true, missing keywords block instead of advising
    #[serde(default)]
    pub keywords_required: bool,
    #[serde(default)]
    pub forbidden_phrases: Vec<String>,
    pub score_threshold: f32,
    /// Advisory structure expectation for long-form targets
    #[serde(default)]
    pub require_paragraph_breaks: bool,
}

/// The candidate under verification, paired with the review score it
/// carries. The gate never recomputes the score.
#[derive(Debug, Clone, Copy)]
pub struct VerifyCandidate<'a> {
    pub content: &'a str,
    pub review_score: f32,
}

/// Closed set of rule names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRule {
    Length,
    Keywords,
    ForbiddenPhrases,
    Malformed,
    ScoreThreshold,
    Structure,
}

impl CheckRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckRule::Length => "length",
            CheckRule::Keywords => "keywords",
            CheckRule::ForbiddenPhrases => "forbidden_phrases",
            CheckRule::Malformed => "malformed",
            CheckRule::ScoreThreshold => "score_threshold",
            CheckRule::Structure => "structure",
        }
    }
}

impl fmt::Display for CheckRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub rule: CheckRule,
    pub passed: bool,
    /// Hard checks block; soft checks only surface in the summary
    pub hard: bool,
    pub detail: String,
}

/// Aggregate verdict over all rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// All hard checks passed
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub summary: String,
}

impl VerificationResult {
    pub fn check(&self, rule: CheckRule) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.rule == rule)
    }
}

/// Evaluate one candidate against a rule set.
pub fn verify(candidate: &VerifyCandidate<'_>, rules: &VerificationRules) -> VerificationResult {
    let content = candidate.content;
    let length = content.chars().count();
    let lowered = content.to_lowercase();

    let mut checks = Vec::with_capacity(6);

    // Length window is a hard bound in both directions.
    let length_check = if length < rules.length.min {
        CheckResult {
            rule: CheckRule::Length,
            passed: false,
            hard: true,
            detail: format!(
                "content length {} below minimum {}",
                length, rules.length.min
            ),
        }
    } else if length > rules.length.max {
        CheckResult {
            rule: CheckRule::Length,
            passed: false,
            hard: true,
            detail: format!(
                "content length {} above maximum {}",
                length, rules.length.max
            ),
        }
    } else {
        CheckResult {
            rule: CheckRule::Length,
            passed: true,
            hard: true,
            detail: format!(
                "content length {} within {}..={}",
                length, rules.length.min, rules.length.max
            ),
        }
    };
    checks.push(length_check);

    let missing: Vec<&str> = rules
        .required_keywords
        .iter()
        .filter(|kw| !lowered.contains(&kw.to_lowercase()))
        .map(String::as_str)
        .collect();
    checks.push(CheckResult {
        rule: CheckRule::Keywords,
        passed: missing.is_empty(),
        hard: rules.keywords_required,
        detail: if missing.is_empty() {
            "all required keywords present".to_string()
        } else {
            format!("missing keywords: {}", missing.join(", "))
        },
    });

    let flagged: Vec<&str> = rules
        .forbidden_phrases
        .iter()
        .filter(|phrase| lowered.contains(&phrase.to_lowercase()))
        .map(String::as_str)
        .collect();
    checks.push(CheckResult {
        rule: CheckRule::ForbiddenPhrases,
        passed: flagged.is_empty(),
        hard: true,
        detail: if flagged.is_empty() {
            "no forbidden phrases present".to_string()
        } else {
            format!("forbidden phrases present: {}", flagged.join(", "))
        },
    });

    // Leading code fences mean the backend leaked formatting artifacts.
    let fenced = content.trim_start().starts_with("```");
    checks.push(CheckResult {
        rule: CheckRule::Malformed,
        passed: !fenced,
        hard: true,
        detail: if fenced {
            "content begins with a code fence marker".to_string()
        } else {
            "no leading formatting artifacts".to_string()
        },
    });

    let score_ok = candidate.review_score >= rules.score_threshold;
    checks.push(CheckResult {
        rule: CheckRule::ScoreThreshold,
        passed: score_ok,
        hard: true,
        detail: format!(
            "review score {:.1} vs threshold {:.1}",
            candidate.review_score, rules.score_threshold
        ),
    });

    if rules.require_paragraph_breaks {
        let has_breaks = content.contains("\n\n");
        checks.push(CheckResult {
            rule: CheckRule::Structure,
            passed: has_breaks,
            hard: false,
            detail: if has_breaks {
                "paragraph breaks present".to_string()
            } else {
                "should contain paragraph breaks".to_string()
            },
        });
    }

    let passed = checks.iter().filter(|c| c.hard).all(|c| c.passed);
    let summary = build_summary(passed, &checks);

    VerificationResult {
        passed,
        checks,
        summary,
    }
}

fn build_summary(passed: bool, checks: &[CheckResult]) -> String {
    let hard_failures: Vec<String> = checks
        .iter()
        .filter(|c| c.hard && !c.passed)
        .map(|c| format!("{}: {}", c.rule, c.detail))
        .collect();
    let advisories: Vec<String> = checks
        .iter()
        .filter(|c| !c.hard && !c.passed)
        .map(|c| format!("{}: {}", c.rule, c.detail))
        .collect();

    let mut summary = if passed {
        "all hard checks passed".to_string()
    } else {
        format!("failed: {}", hard_failures.join("; "))
    };
    if !advisories.is_empty() {
        summary.push_str(&format!(" (advisory: {})", advisories.join("; ")));
    }
    summary
}
