use std::sync::Arc;

use tracing::{debug, warn};

use groundrag_core::traits::VectorIndexClient;
use groundrag_core::types::ChunkId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub chunk_id: ChunkId,
    pub distance: f32,
    pub normalized_score: f32,
}

/// Map a non-negative distance onto the shared `[0, 1]` confidence scale.
///
/// `1 / (1 + d)`: zero distance is 1.0, distance 1 is 0.5, and the score
/// decreases monotonically. Negative distances are clamped to zero.
pub fn normalize_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Thin, failure-absorbing wrapper over an external ANN index.
#[derive(Clone)]
pub struct VectorIndexAdapter {
    client: Arc<dyn VectorIndexClient>,
}

impl VectorIndexAdapter {
    pub fn new(client: Arc<dyn VectorIndexClient>) -> Self { Self { client } }

    /// Nearest `k` chunks to `embedding`, best first. Never fails: an
    /// unavailable index yields no hits and retrieval goes lexical-only.
    pub async fn query(&self, embedding: &[f32], k: usize) -> Vec<VectorHit> {
        let raw = match self.client.query(embedding, k).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "vector index unavailable; retrieval degrades to lexical-only");
                return Vec::new();
            }
        };
        let mut hits: Vec<VectorHit> = raw
            .into_iter()
            .filter(|n| n.distance.is_finite())
            .map(|n| VectorHit { chunk_id: n.chunk_id, distance: n.distance, normalized_score: normalize_distance(n.distance) })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        debug!(hits = hits.len(), "vector candidates");
        hits
    }
}
