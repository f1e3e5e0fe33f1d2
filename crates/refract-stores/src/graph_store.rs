//! In-memory KnowledgeGraph for development and testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use refract_core::store::{IdentityRecord, KnowledgeGraph, StoreError};

/// In-memory identity records keyed by name.
pub struct InMemoryKnowledgeGraph {
    records: RwLock<HashMap<String, IdentityRecord>>,
}

impl InMemoryKnowledgeGraph {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a full identity record (tests and fixtures).
    pub fn insert_identity(&self, record: IdentityRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        records.insert(record.name.clone(), record);
        Ok(())
    }
}

impl Default for InMemoryKnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeGraph for InMemoryKnowledgeGraph {
    async fn query_identity(&self, name: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(records.get(name).cloned())
    }

    async fn record_past_work(&self, name: &str, work: &str) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let record = records.entry(name.to_string()).or_insert_with(|| IdentityRecord {
            name: name.to_string(),
            ..IdentityRecord::default()
        });
        record.past_works.push(work.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_missing_identity_returns_none() {
        tokio_test::block_on(async {
            let graph = InMemoryKnowledgeGraph::new();
            assert!(graph.query_identity("nobody").await.unwrap().is_none());
        });
    }

    #[test]
    fn test_record_past_work_creates_identity_when_absent() {
        tokio_test::block_on(async {
            let graph = InMemoryKnowledgeGraph::new();
            graph.record_past_work("acme", "spring launch thread").await.unwrap();
            graph.record_past_work("acme", "summer recap post").await.unwrap();

            let record = graph.query_identity("acme").await.unwrap().unwrap();
            assert_eq!(record.name, "acme");
            assert_eq!(record.past_works.len(), 2);
        });
    }

    #[test]
    fn test_seeded_identity_round_trips() {
        tokio_test::block_on(async {
            let graph = InMemoryKnowledgeGraph::new();
            graph
                .insert_identity(IdentityRecord {
                    name: "acme".to_string(),
                    beliefs: vec!["ship weekly".to_string()],
                    stances: vec!["privacy-first".to_string()],
                    past_works: vec![],
                })
                .unwrap();

            let record = graph.query_identity("acme").await.unwrap().unwrap();
            assert_eq!(record.beliefs, vec!["ship weekly"]);
            assert_eq!(record.stances, vec!["privacy-first"]);
        });
    }
}
