//! # Refract Stores
//!
//! Storage and fan-out implementations for the Refract engine.
//!
//! This crate provides:
//! - WorkflowEventBus: the one process-wide shared resource, a per-workflow
//!   publish/subscribe hub with bounded replay history
//! - In-memory SemanticStore / KnowledgeGraph / OutcomeStore implementations

mod event_bus;
mod graph_store;
mod outcome_store;
mod semantic_store;

pub use event_bus::{
    EventBusConfig, EventKind, Subscription, WorkflowEvent, WorkflowEventBus,
};
pub use graph_store::InMemoryKnowledgeGraph;
pub use outcome_store::InMemoryOutcomeStore;
pub use semantic_store::{cosine_similarity, InMemorySemanticStore};

// Re-export core traits for convenience
pub use refract_core::store::{
    IdentityRecord, KnowledgeGraph, MetadataFilter, OutcomeStore, SemanticHit, SemanticStore,
    StoreError, StoredOutcome,
};
