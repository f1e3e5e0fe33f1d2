//! Brand profile carried alongside a run.
//!
//! Stored and owned by an external collaborator; the engine only reads it.

use serde::{Deserialize, Serialize};

/// Brand voice and constraint profile for a content owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandProfile {
    pub name: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub required_keywords: Vec<String>,
    #[serde(default)]
    pub forbidden_words: Vec<String>,
    #[serde(default)]
    pub guidelines: Option<String>,
}

impl BrandProfile {
    /// Flatten the profile into reference text for similarity scoring.
    pub fn reference_text(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if !self.tone.is_empty() {
            parts.push(self.tone.clone());
        }
        if !self.values.is_empty() {
            parts.push(self.values.join(" "));
        }
        if !self.audience.is_empty() {
            parts.push(self.audience.clone());
        }
        if let Some(guidelines) = &self.guidelines {
            parts.push(guidelines.clone());
        }
        parts.join("\n")
    }
}
