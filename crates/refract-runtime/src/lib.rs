//! # Refract Runtime
//!
//! The workflow orchestration engine: plans a bounded sequence of stage
//! invocations, executes them against pluggable generation/analysis
//! services, gates every draft through deterministic verification, and
//! remediates failures through a bounded reflection-and-retry loop.
//!
//! ## Architecture
//!
//! ```text
//! run(source, brand, targets)
//!    ↓
//! Memory Context Merger (semantic + graph, fault-tolerant)
//!    ↓
//! Planner (generation backend, deterministic fallback)
//!    ↓
//! Ingest (once)
//!    ↓
//! per target: Generate → Review → Verify ──passed──→ published
//!                  ↑                  │failed
//!                  └── Reflect ←──────┘   (bounded retries, then escalate)
//!    ↓
//! await background image task → Publish approved → WorkflowResult
//! ```
//!
//! Every external call is bounded by a timeout and degrades to a
//! stage-specific fallback; `run` never returns an error across its
//! boundary.

mod bootstrap;
mod context;
mod kpi;
mod orchestrator;
mod planner;
mod reflector;
mod stages;

pub use bootstrap::{event_bus_from_settings, generation_client_from_settings};
pub use context::ContextMerger;
pub use kpi::build_result;
pub use orchestrator::{EngineServices, Orchestrator, RuntimeError};
pub use planner::{PlanOutcome, Planner};
pub use reflector::{Reflector, RetryDecision};
pub use stages::{GenerateStage, IngestStage, PublishStage, ReviewStage};

// Re-export core types for convenience
pub use refract_core::prelude::*;
