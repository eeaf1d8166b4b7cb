//! Seams to the collaborators the pipeline consumes but does not own.

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{ChunkId, RiskTier, Snippet};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// A raw neighbour as reported by an external ANN index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawNeighbor {
    pub chunk_id: ChunkId,
    pub distance: f32,
}

/// Client of an approximate-nearest-neighbour index. Lower distance is closer.
#[async_trait]
pub trait VectorIndexClient: Send + Sync {
    async fn query(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<RawNeighbor>>;
}

/// Everything a generation service needs for one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: Vec<Snippet>,
    pub timeout: Duration,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Stable label used in logs (e.g. `openai:gpt-4o-mini`).
    fn name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;
}

/// Semantic/intent risk classification of one clean segment.
#[async_trait]
pub trait RiskClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<RiskTier>;
}

/// Optional relevance reranking service. Returns one score in `[0, 1]` per passage.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, passages: &[&str]) -> anyhow::Result<Vec<f32>>;
}

/// Persistence for the lexical snapshot: a versioned blob plus a corpus-hash sidecar.
pub trait SnapshotStore: Send + Sync {
    fn read_sidecar(&self) -> anyhow::Result<Option<String>>;
    fn read_blob(&self) -> anyhow::Result<Option<Vec<u8>>>;
    /// Replace blob and sidecar. Implementations must never leave a blob that
    /// another reader could take for a complete snapshot when interrupted.
    fn write(&self, blob: &[u8], corpus_hash: &str) -> anyhow::Result<()>;
}
