//! Target type definitions
//!
//! Target names one platform/output-format the source content is adapted for.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strongly-typed platform target identifier.
///
/// Normalized to a trimmed, lowercase form at construction so per-target
/// maps and the target catalog agree on a single spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deduplicate a raw target list while preserving first-seen order.
    pub fn dedup(raw: impl IntoIterator<Item = Target>) -> Vec<Target> {
        let mut seen = std::collections::HashSet::new();
        raw.into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for Target {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
