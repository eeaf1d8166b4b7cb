use async_trait::async_trait;

use groundrag_core::traits::{Embedder, RawNeighbor, VectorIndexClient};
use groundrag_core::types::ChunkId;
use groundrag_core::Corpus;

/// Brute-force in-memory index with cosine distance (`1 - cos`).
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: Vec<(ChunkId, Vec<f32>)>,
}

impl FlatIndex {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, chunk_id: ChunkId, vector: Vec<f32>) { self.entries.push((chunk_id, vector)); }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Embed every chunk of `corpus` in batches of `batch_size`.
    pub fn build(corpus: &Corpus, embedder: &dyn Embedder, batch_size: usize) -> anyhow::Result<Self> {
        Self::build_with_progress(corpus, embedder, batch_size, |_| {})
    }

    pub fn build_with_progress(
        corpus: &Corpus,
        embedder: &dyn Embedder,
        batch_size: usize,
        mut on_batch: impl FnMut(usize),
    ) -> anyhow::Result<Self> {
        let chunks: Vec<_> = corpus.iter().collect();
        let mut index = Self::new();
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts)?;
            anyhow::ensure!(vectors.len() == batch.len(), "embedder returned {} vectors for {} texts", vectors.len(), batch.len());
            for (chunk, v) in batch.iter().zip(vectors) {
                anyhow::ensure!(v.len() == embedder.dim(), "embedding for chunk {} has dim {}", chunk.id, v.len());
                index.insert(chunk.id, v);
            }
            on_batch(batch.len());
        }
        Ok(index)
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON { return 1.0; }
    (1.0 - dot / (na * nb)).max(0.0)
}

#[async_trait]
impl VectorIndexClient for FlatIndex {
    async fn query(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<RawNeighbor>> {
        if let Some((_, first)) = self.entries.first() {
            anyhow::ensure!(first.len() == vector.len(), "query has dim {}, index has dim {}", vector.len(), first.len());
        }
        let mut out: Vec<RawNeighbor> = self
            .entries
            .iter()
            .filter(|(_, v)| v.len() == vector.len())
            .map(|(id, v)| RawNeighbor { chunk_id: *id, distance: cosine_distance(vector, v) })
            .collect();
        out.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.chunk_id.cmp(&b.chunk_id)));
        out.truncate(k);
        Ok(out)
    }
}
