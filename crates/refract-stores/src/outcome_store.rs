//! In-memory OutcomeStore for development and testing.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use refract_core::store::{OutcomeStore, StoreError, StoredOutcome};
use refract_core::types::{WorkflowResult, WorkflowState};

/// In-memory outcome journal, newest last.
pub struct InMemoryOutcomeStore {
    outcomes: RwLock<Vec<StoredOutcome>>,
}

impl InMemoryOutcomeStore {
    pub fn new() -> Self {
        Self {
            outcomes: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryOutcomeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutcomeStore for InMemoryOutcomeStore {
    async fn save(
        &self,
        state: &WorkflowState,
        result: &WorkflowResult,
    ) -> Result<(), StoreError> {
        let mut outcomes = self
            .outcomes
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        outcomes.push(StoredOutcome {
            state: state.clone(),
            result: result.clone(),
            saved_at: Utc::now(),
        });
        Ok(())
    }

    async fn load(&self, workflow_id: &str) -> Result<Option<StoredOutcome>, StoreError> {
        let outcomes = self
            .outcomes
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(outcomes
            .iter()
            .rev()
            .find(|o| o.state.id.as_str() == workflow_id)
            .cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredOutcome>, StoreError> {
        let outcomes = self
            .outcomes
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(outcomes.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::types::{KpiSummary, Target, WorkflowStatus};

    fn make_outcome(goal: &str) -> (WorkflowState, WorkflowResult) {
        let state = WorkflowState::new(goal, "source", None, vec![Target::new("twitter")], 3);
        let result = WorkflowResult {
            workflow_id: state.id.to_string(),
            status: WorkflowStatus::Completed,
            variants: Vec::new(),
            kpi: KpiSummary {
                hit_rate: 100.0,
                automation_rate: 100.0,
                published_count: 1,
                avg_consistency_score: 90.0,
                processing_time_seconds: 1.2,
            },
        };
        (state, result)
    }

    #[test]
    fn test_save_and_load_by_workflow_id() {
        tokio_test::block_on(async {
            let store = InMemoryOutcomeStore::new();
            let (state, result) = make_outcome("first run");
            store.save(&state, &result).await.unwrap();

            let loaded = store.load(state.id.as_str()).await.unwrap().unwrap();
            assert_eq!(loaded.result.workflow_id, state.id.to_string());
            assert_eq!(loaded.state.goal, "first run");
        });
    }

    #[test]
    fn test_load_unknown_id_returns_none() {
        tokio_test::block_on(async {
            let store = InMemoryOutcomeStore::new();
            assert!(store.load("missing").await.unwrap().is_none());
        });
    }

    #[test]
    fn test_list_recent_returns_newest_first() {
        tokio_test::block_on(async {
            let store = InMemoryOutcomeStore::new();
            for goal in ["one", "two", "three"] {
                let (state, result) = make_outcome(goal);
                store.save(&state, &result).await.unwrap();
            }

            let recent = store.list_recent(2).await.unwrap();
            assert_eq!(recent.len(), 2);
            assert_eq!(recent[0].state.goal, "three");
            assert_eq!(recent[1].state.goal, "two");
        });
    }
}
