//! Stage executors
//!
//! Each executor wraps one call to an external service, applies the
//! stage's fallback on failure, and records a trace entry of what it
//! received, decided, and passed on. No executor lets a backend failure
//! escape; every one degrades in place.

mod generate;
mod ingest;
mod publish;
mod review;

pub use generate::GenerateStage;
pub use ingest::IngestStage;
pub use publish::PublishStage;
pub use review::ReviewStage;

/// Clip to a character budget; used for trace previews.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(max_chars).collect();
        clipped.push_str("...");
        clipped
    }
}
