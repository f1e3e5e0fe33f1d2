//! Memory Context Merger - grounds a run in prior brand history.
//!
//! Issues a similarity query against the semantic store and, when a brand
//! identity exists, an identity query against the knowledge graph. The two
//! calls are independently fault-tolerant: a failure, timeout, or empty
//! result from either yields a partial context, never an aborted run.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use refract_core::store::{KnowledgeGraph, SemanticStore};
use refract_core::types::{BrandProfile, IdentityContext};

const SEMANTIC_TOP_K: usize = 3;

pub struct ContextMerger {
    semantic: Arc<dyn SemanticStore>,
    graph: Arc<dyn KnowledgeGraph>,
    call_timeout: Duration,
}

impl ContextMerger {
    pub fn new(
        semantic: Arc<dyn SemanticStore>,
        graph: Arc<dyn KnowledgeGraph>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            semantic,
            graph,
            call_timeout,
        }
    }

    /// Merge semantic and graph retrieval into one context object. Always
    /// returns; every field of the result is optional downstream.
    pub async fn merge(&self, source: &str, brand: Option<&BrandProfile>) -> IdentityContext {
        let semantic_call = timeout(
            self.call_timeout,
            self.semantic.query(source, SEMANTIC_TOP_K, None),
        );
        let graph_call = async {
            match brand {
                Some(profile) if !profile.name.is_empty() => Some(
                    timeout(self.call_timeout, self.graph.query_identity(&profile.name)).await,
                ),
                _ => None,
            }
        };

        let (semantic_result, graph_result) = tokio::join!(semantic_call, graph_call);

        let related = match semantic_result {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(error = %e, "semantic query failed, continuing without related content");
                Vec::new()
            }
            Err(_) => {
                warn!("semantic query timed out, continuing without related content");
                Vec::new()
            }
        };

        let identity = match graph_result {
            Some(Ok(Ok(record))) => record,
            Some(Ok(Err(e))) => {
                warn!(error = %e, "graph query failed, continuing without identity");
                None
            }
            Some(Err(_)) => {
                warn!("graph query timed out, continuing without identity");
                None
            }
            None => None,
        };

        let context = IdentityContext {
            semantic_found: !related.is_empty(),
            graph_found: identity.is_some(),
            related,
            identity,
        };
        debug!(
            semantic_found = context.semantic_found,
            graph_found = context.graph_found,
            "identity context merged"
        );
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use refract_core::store::{
        IdentityRecord, MetadataFilter, SemanticHit, StoreError,
    };
    use std::collections::HashMap;

    struct FailingSemanticStore;

    #[async_trait]
    impl SemanticStore for FailingSemanticStore {
        async fn upsert(
            &self,
            _text: &str,
            _metadata: HashMap<String, String>,
        ) -> Result<String, StoreError> {
            Err(StoreError::Internal("down".to_string()))
        }

        async fn query(
            &self,
            _text: &str,
            _top_k: usize,
            _filter: Option<MetadataFilter>,
        ) -> Result<Vec<SemanticHit>, StoreError> {
            Err(StoreError::Internal("down".to_string()))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, StoreError> {
            Err(StoreError::Internal("down".to_string()))
        }
    }

    struct HealthySemanticStore;

    #[async_trait]
    impl SemanticStore for HealthySemanticStore {
        async fn upsert(
            &self,
            _text: &str,
            _metadata: HashMap<String, String>,
        ) -> Result<String, StoreError> {
            Ok("id".to_string())
        }

        async fn query(
            &self,
            _text: &str,
            top_k: usize,
            _filter: Option<MetadataFilter>,
        ) -> Result<Vec<SemanticHit>, StoreError> {
            Ok((0..top_k)
                .map(|i| SemanticHit {
                    text: format!("prior post {}", i),
                    score: 0.9 - i as f32 * 0.1,
                    metadata: HashMap::new(),
                })
                .collect())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, StoreError> {
            Ok(vec![1.0])
        }
    }

    struct HealthyGraph;

    #[async_trait]
    impl KnowledgeGraph for HealthyGraph {
        async fn query_identity(&self, name: &str) -> Result<Option<IdentityRecord>, StoreError> {
            Ok(Some(IdentityRecord {
                name: name.to_string(),
                beliefs: vec!["ship weekly".to_string()],
                ..IdentityRecord::default()
            }))
        }

        async fn record_past_work(&self, _name: &str, _work: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct FailingGraph;

    #[async_trait]
    impl KnowledgeGraph for FailingGraph {
        async fn query_identity(&self, _name: &str) -> Result<Option<IdentityRecord>, StoreError> {
            Err(StoreError::Internal("down".to_string()))
        }

        async fn record_past_work(&self, _name: &str, _work: &str) -> Result<(), StoreError> {
            Err(StoreError::Internal("down".to_string()))
        }
    }

    fn brand() -> BrandProfile {
        BrandProfile {
            name: "acme".to_string(),
            ..BrandProfile::default()
        }
    }

    #[tokio::test]
    async fn test_merge_with_both_collaborators_healthy() {
        let merger = ContextMerger::new(
            Arc::new(HealthySemanticStore),
            Arc::new(HealthyGraph),
            Duration::from_secs(1),
        );
        let context = merger.merge("launch post", Some(&brand())).await;
        assert!(context.semantic_found);
        assert!(context.graph_found);
        assert_eq!(context.related.len(), 3);
        assert_eq!(context.identity.unwrap().name, "acme");
    }

    #[tokio::test]
    async fn test_semantic_failure_yields_partial_context() {
        let merger = ContextMerger::new(
            Arc::new(FailingSemanticStore),
            Arc::new(HealthyGraph),
            Duration::from_secs(1),
        );
        let context = merger.merge("launch post", Some(&brand())).await;
        assert!(!context.semantic_found);
        assert!(context.related.is_empty());
        assert!(context.graph_found);
    }

    #[tokio::test]
    async fn test_graph_failure_yields_partial_context() {
        let merger = ContextMerger::new(
            Arc::new(HealthySemanticStore),
            Arc::new(FailingGraph),
            Duration::from_secs(1),
        );
        let context = merger.merge("launch post", Some(&brand())).await;
        assert!(context.semantic_found);
        assert!(!context.graph_found);
    }

    #[tokio::test]
    async fn test_no_brand_skips_graph_entirely() {
        let merger = ContextMerger::new(
            Arc::new(HealthySemanticStore),
            Arc::new(FailingGraph),
            Duration::from_secs(1),
        );
        let context = merger.merge("launch post", None).await;
        assert!(!context.graph_found);
        assert!(context.identity.is_none());
    }

    #[tokio::test]
    async fn test_both_failing_still_returns_empty_context() {
        let merger = ContextMerger::new(
            Arc::new(FailingSemanticStore),
            Arc::new(FailingGraph),
            Duration::from_secs(1),
        );
        let context = merger.merge("launch post", Some(&brand())).await;
        assert!(!context.semantic_found);
        assert!(!context.graph_found);
    }
}
