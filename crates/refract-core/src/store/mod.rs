//! Store contracts
//!
//! This module defines the persistence-adjacent collaborator traits:
//! - SemanticStore: similarity search over prior content
//! - KnowledgeGraph: identity records (beliefs, stances, past works)
//! - OutcomeStore: verbatim persistence of finished runs
//!
//! Implementations live in the refract-stores crate. Every trait is
//! fault-isolated at its call sites: a failing store degrades the run,
//! never aborts it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{WorkflowResult, WorkflowState};

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One similarity hit from the semantic store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Exact-match filter over hit metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub key: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// SemanticStore trait - similarity search and embedding over prior content.
#[async_trait]
pub trait SemanticStore: Send + Sync {
    /// Insert or update a document, returning its id
    async fn upsert(
        &self,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, StoreError>;

    /// Top-k similarity query, optionally filtered by metadata
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<SemanticHit>, StoreError>;

    /// Embed a text into the store's vector space
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError>;
}

/// Identity record retrieved from the knowledge graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    #[serde(default)]
    pub beliefs: Vec<String>,
    #[serde(default)]
    pub stances: Vec<String>,
    #[serde(default)]
    pub past_works: Vec<String>,
}

/// KnowledgeGraph trait - identity grounding for a content owner.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Look up an identity by name
    async fn query_identity(&self, name: &str) -> Result<Option<IdentityRecord>, StoreError>;

    /// Append a published work to an identity, creating it if absent
    async fn record_past_work(&self, name: &str, work: &str) -> Result<(), StoreError>;
}

/// A finished run persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOutcome {
    pub state: WorkflowState,
    pub result: WorkflowResult,
    pub saved_at: DateTime<Utc>,
}

/// OutcomeStore trait - persistence boundary for finished runs.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Persist a finished run (state and result verbatim)
    async fn save(&self, state: &WorkflowState, result: &WorkflowResult)
        -> Result<(), StoreError>;

    /// Load one outcome by workflow id
    async fn load(&self, workflow_id: &str) -> Result<Option<StoredOutcome>, StoreError>;

    /// Most recent outcomes, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredOutcome>, StoreError>;
}
