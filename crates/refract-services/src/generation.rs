//! Generation service contract and test double.
//!
//! The engine treats the generation backend as an opaque text-in/text-out
//! collaborator. Structured replies are requested per prompt kind but never
//! trusted: every call site tolerates non-JSON or malformed output.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Which engine capability a call serves. Backends may route kinds to
/// different models or prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Structured plan for a run
    Plan,
    /// Source content analysis
    Ingest,
    /// Platform variant drafting
    Generate,
    /// Weighted brand-consistency scoring
    Review,
    /// Failure root-cause and remediation strategy
    Reflect,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Plan => "plan",
            PromptKind::Ingest => "ingest",
            PromptKind::Generate => "generate",
            PromptKind::Review => "review",
            PromptKind::Reflect => "reflect",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// GenerationService trait - one opaque call per stage invocation.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Invoke the backend for one prompt kind with structured input,
    /// returning raw text. May fail or time out.
    async fn invoke(&self, kind: PromptKind, input: Value) -> Result<String, ServiceError>;
}

#[async_trait]
impl GenerationService for Arc<dyn GenerationService> {
    async fn invoke(&self, kind: PromptKind, input: Value) -> Result<String, ServiceError> {
        (**self).invoke(kind, input).await
    }
}

/// Scriptable mock for tests and examples.
///
/// Replies are queued per prompt kind and consumed in order; when a kind's
/// queue is empty the sticky reply (if any) is repeated. Kinds marked as
/// failing return a response error instead.
#[derive(Default)]
pub struct MockGenerationService {
    queues: Mutex<HashMap<PromptKind, Vec<String>>>,
    sticky: Mutex<HashMap<PromptKind, String>>,
    failing: Mutex<HashMap<PromptKind, bool>>,
    fail_all: Mutex<bool>,
    calls: Mutex<Vec<PromptKind>>,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for a kind (consumed in FIFO order).
    pub fn push_reply(&self, kind: PromptKind, reply: impl Into<String>) {
        self.queues
            .lock()
            .expect("mock lock")
            .entry(kind)
            .or_default()
            .push(reply.into());
    }

    /// Set a reply repeated whenever the kind's queue is empty.
    pub fn with_reply(self, kind: PromptKind, reply: impl Into<String>) -> Self {
        self.sticky
            .lock()
            .expect("mock lock")
            .insert(kind, reply.into());
        self
    }

    /// Make one kind fail every call.
    pub fn with_failing_kind(self, kind: PromptKind) -> Self {
        self.failing.lock().expect("mock lock").insert(kind, true);
        self
    }

    /// Make every call fail (backend fully unavailable).
    pub fn with_all_failing(self) -> Self {
        *self.fail_all.lock().expect("mock lock") = true;
        self
    }

    /// Kinds invoked so far, in call order.
    pub fn calls(&self) -> Vec<PromptKind> {
        self.calls.lock().expect("mock lock").clone()
    }

    /// Number of calls for one kind.
    pub fn call_count(&self, kind: PromptKind) -> usize {
        self.calls
            .lock()
            .expect("mock lock")
            .iter()
            .filter(|k| **k == kind)
            .count()
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn invoke(&self, kind: PromptKind, _input: Value) -> Result<String, ServiceError> {
        self.calls.lock().expect("mock lock").push(kind);

        if *self.fail_all.lock().expect("mock lock") {
            return Err(ServiceError::Response("backend unavailable".to_string()));
        }
        if self
            .failing
            .lock()
            .expect("mock lock")
            .get(&kind)
            .copied()
            .unwrap_or(false)
        {
            return Err(ServiceError::Response(format!(
                "scripted failure for {}",
                kind
            )));
        }

        let mut queues = self.queues.lock().expect("mock lock");
        if let Some(queue) = queues.get_mut(&kind) {
            if !queue.is_empty() {
                return Ok(queue.remove(0));
            }
        }
        if let Some(reply) = self.sticky.lock().expect("mock lock").get(&kind) {
            return Ok(reply.clone());
        }
        Err(ServiceError::Response(format!(
            "no scripted reply for {}",
            kind
        )))
    }
}
