//! WorkflowEventBus - per-workflow realtime event fan-out.
//!
//! The bus is the single resource shared across concurrent runs. It keeps
//! one broadcast channel plus a bounded history ring per workflow id so a
//! late-joining subscriber can replay what it missed. Total subscriber
//! count is capped; history for completed workflows is discarded after a
//! fixed retention window via `purge_completed`.
//!
//! The engine only ever publishes. Subscribing is the consumer surface;
//! dropping the `Subscription` unsubscribes.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use refract_core::store::StoreError;

/// Event kinds a consumer can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Log,
    Decision,
    Progress,
    Result,
    Complete,
}

/// Typed progress notification for one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Log {
        workflow_id: String,
        level: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Decision {
        workflow_id: String,
        stage: String,
        outcome: String,
        rationale: String,
        timestamp: DateTime<Utc>,
    },
    Progress {
        workflow_id: String,
        stage: String,
        target: Option<String>,
        detail: String,
        timestamp: DateTime<Utc>,
    },
    Result {
        workflow_id: String,
        target: String,
        published: bool,
        score: f32,
        timestamp: DateTime<Utc>,
    },
    Complete {
        workflow_id: String,
        status: String,
        published_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    pub fn log(
        workflow_id: impl Into<String>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Log {
            workflow_id: workflow_id.into(),
            level: level.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn decision(
        workflow_id: impl Into<String>,
        stage: impl Into<String>,
        outcome: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self::Decision {
            workflow_id: workflow_id.into(),
            stage: stage.into(),
            outcome: outcome.into(),
            rationale: rationale.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn progress(
        workflow_id: impl Into<String>,
        stage: impl Into<String>,
        target: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Progress {
            workflow_id: workflow_id.into(),
            stage: stage.into(),
            target,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn result(
        workflow_id: impl Into<String>,
        target: impl Into<String>,
        published: bool,
        score: f32,
    ) -> Self {
        Self::Result {
            workflow_id: workflow_id.into(),
            target: target.into(),
            published,
            score,
            timestamp: Utc::now(),
        }
    }

    pub fn complete(
        workflow_id: impl Into<String>,
        status: impl Into<String>,
        published_count: usize,
    ) -> Self {
        Self::Complete {
            workflow_id: workflow_id.into(),
            status: status.into(),
            published_count,
            timestamp: Utc::now(),
        }
    }

    pub fn workflow_id(&self) -> &str {
        match self {
            WorkflowEvent::Log { workflow_id, .. } => workflow_id,
            WorkflowEvent::Decision { workflow_id, .. } => workflow_id,
            WorkflowEvent::Progress { workflow_id, .. } => workflow_id,
            WorkflowEvent::Result { workflow_id, .. } => workflow_id,
            WorkflowEvent::Complete { workflow_id, .. } => workflow_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            WorkflowEvent::Log { .. } => EventKind::Log,
            WorkflowEvent::Decision { .. } => EventKind::Decision,
            WorkflowEvent::Progress { .. } => EventKind::Progress,
            WorkflowEvent::Result { .. } => EventKind::Result,
            WorkflowEvent::Complete { .. } => EventKind::Complete,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WorkflowEvent::Log { timestamp, .. } => *timestamp,
            WorkflowEvent::Decision { timestamp, .. } => *timestamp,
            WorkflowEvent::Progress { timestamp, .. } => *timestamp,
            WorkflowEvent::Result { timestamp, .. } => *timestamp,
            WorkflowEvent::Complete { timestamp, .. } => *timestamp,
        }
    }
}

/// Bus sizing and retention.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Broadcast channel capacity per workflow id
    pub channel_capacity: usize,
    /// Replay ring size per workflow id
    pub history_limit: usize,
    /// Total live subscribers across all workflow ids
    pub max_subscribers: usize,
    /// How long a completed workflow's history is retained
    pub history_retention: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            history_limit: 256,
            max_subscribers: 1024,
            history_retention: Duration::seconds(300),
        }
    }
}

struct ChannelEntry {
    tx: broadcast::Sender<WorkflowEvent>,
    history: VecDeque<WorkflowEvent>,
    completed_at: Option<DateTime<Utc>>,
}

/// A live subscription: missed events replayed up front, then the
/// broadcast receiver. Drop it to unsubscribe.
pub struct Subscription {
    /// Buffered events published before this subscription, oldest first
    pub replay: Vec<WorkflowEvent>,
    receiver: broadcast::Receiver<WorkflowEvent>,
    filter: Option<EventKind>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("replay", &self.replay)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Next matching live event; skips kinds outside the filter.
    pub async fn recv(&mut self) -> Result<WorkflowEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match self.filter {
                Some(kind) if event.kind() != kind => continue,
                _ => return Ok(event),
            }
        }
    }
}

/// Process-wide publish/subscribe hub keyed by workflow id.
pub struct WorkflowEventBus {
    inner: RwLock<HashMap<String, ChannelEntry>>,
    config: EventBusConfig,
}

impl WorkflowEventBus {
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Publish an event to live subscribers and the replay ring. A missing
    /// receiver is not an error; the ring remains the late-join source.
    pub fn publish(&self, event: WorkflowEvent) {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            // A poisoned registry only loses fan-out, never the run itself.
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = inner
            .entry(event.workflow_id().to_string())
            .or_insert_with(|| new_entry(&self.config));

        if let WorkflowEvent::Complete { timestamp, .. } = &event {
            entry.completed_at = Some(*timestamp);
        }

        entry.history.push_back(event.clone());
        while entry.history.len() > self.config.history_limit {
            entry.history.pop_front();
        }

        let _ = entry.tx.send(event);
    }

    /// Subscribe to one workflow id, optionally filtered by event kind.
    /// Fails when the global subscriber cap is reached.
    pub fn subscribe(
        &self,
        workflow_id: &str,
        filter: Option<EventKind>,
    ) -> Result<Subscription, StoreError> {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let live: usize = inner.values().map(|e| e.tx.receiver_count()).sum();
        if live >= self.config.max_subscribers {
            return Err(StoreError::Capacity(format!(
                "subscriber cap {} reached",
                self.config.max_subscribers
            )));
        }

        let entry = inner
            .entry(workflow_id.to_string())
            .or_insert_with(|| new_entry(&self.config));

        let replay: Vec<WorkflowEvent> = entry
            .history
            .iter()
            .filter(|e| filter.map(|kind| e.kind() == kind).unwrap_or(true))
            .cloned()
            .collect();

        Ok(Subscription {
            replay,
            receiver: entry.tx.subscribe(),
            filter,
        })
    }

    /// Live subscriber count for one workflow id.
    pub fn subscriber_count(&self, workflow_id: &str) -> usize {
        match self.inner.read() {
            Ok(inner) => inner
                .get(workflow_id)
                .map(|e| e.tx.receiver_count())
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Drop channels for workflows completed longer ago than the retention
    /// window. Returns how many were removed.
    pub fn purge_completed(&self, now: DateTime<Utc>) -> usize {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let retention = self.config.history_retention;
        let before = inner.len();
        inner.retain(|_, entry| match entry.completed_at {
            Some(completed_at) => now - completed_at < retention,
            None => true,
        });
        before - inner.len()
    }
}

impl Default for WorkflowEventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

fn new_entry(config: &EventBusConfig) -> ChannelEntry {
    let (tx, _) = broadcast::channel(config.channel_capacity.max(1));
    ChannelEntry {
        tx,
        history: VecDeque::new(),
        completed_at: None,
    }
}
