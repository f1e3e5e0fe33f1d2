//! In-memory SemanticStore for development and testing.
//!
//! Embeddings are deterministic token-hash vectors, which keeps the review
//! fallback path executable without a real vector backend.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use async_trait::async_trait;

use refract_core::store::{MetadataFilter, SemanticHit, SemanticStore, StoreError};

const EMBEDDING_DIM: usize = 64;

struct Document {
    text: String,
    metadata: HashMap<String, String>,
    embedding: Vec<f32>,
}

/// In-memory implementation over a hash-token embedding space.
pub struct InMemorySemanticStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl InMemorySemanticStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySemanticStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticStore for InMemorySemanticStore {
    async fn upsert(
        &self,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let embedding = embed_text(text);
        let mut documents = self
            .documents
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        documents.insert(
            id.clone(),
            Document {
                text: text.to_string(),
                metadata,
                embedding,
            },
        );
        Ok(id)
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<SemanticHit>, StoreError> {
        let query = embed_text(text);
        let documents = self
            .documents
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        let mut hits: Vec<SemanticHit> = documents
            .values()
            .filter(|doc| match &filter {
                Some(f) => doc.metadata.get(&f.key) == Some(&f.value),
                None => true,
            })
            .map(|doc| SemanticHit {
                text: doc.text.clone(),
                score: cosine_similarity(&query, &doc.embedding),
                metadata: doc.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        Ok(embed_text(text))
    }
}

/// Deterministic bag-of-tokens embedding: each token hashes to one slot
/// (and a sign), the vector is L2-normalized.
fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        token.to_lowercase().hash(&mut hasher);
        let digest = hasher.finish();
        let slot = (digest % EMBEDDING_DIM as u64) as usize;
        let sign = if (digest >> 32) % 2 == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Cosine similarity of two equal-length vectors; 0.0 for degenerate input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
