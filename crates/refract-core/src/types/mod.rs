//! Core type definitions for Refract
//!
//! This module contains the fundamental types used throughout the engine:
//! - Target: one platform/output-format a source piece is adapted for
//! - Plan: ordered sequence of stage invocations for one run
//! - WorkflowState: the mutable record threaded through one run
//! - Stage outputs: closed, tagged result types per stage
//! - WorkflowResult: the complete per-run outcome with quality metrics

mod brand;
mod plan;
mod result;
mod stage;
mod target;
mod workflow;

pub use brand::BrandProfile;
pub use plan::{Plan, PlanStep, StageKind};
pub use result::{KpiSummary, VariantResult, WorkflowResult};
pub use stage::{
    CriterionScore, GenerateMetadata, GenerateOutput, ImageOutput, IngestOutput, PublishOutput,
    PublishReceipt, ReflectionResult, ReviewMethod, ReviewOutput, Sentiment,
};
pub use target::Target;
pub use workflow::{
    DecisionEntry, ErrorEntry, IdentityContext, TraceEntry, WorkflowId, WorkflowState,
    WorkflowStatus,
};
