//! # Refract Services
//!
//! Collaborator contracts and clients for the Refract engine.
//!
//! This crate provides:
//! - GenerationService trait plus an HTTP (OpenAI-compatible) client and a
//!   scriptable mock
//! - The image enrichment provider chain (never fails past its last rung)
//!
//! Every client here may fail or time out; call sites in the runtime crate
//! degrade to stage-specific fallbacks rather than aborting a run.

mod generation;
mod http;
mod image;

pub use generation::{GenerationService, MockGenerationService, PromptKind, ServiceError};
pub use http::{HttpGenerationClient, HttpGenerationConfig};
pub use image::{ImageChain, ImageProvider, StaticImageProvider};
