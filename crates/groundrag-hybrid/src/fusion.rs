use std::collections::HashMap;

use tracing::debug;

use groundrag_core::types::{Candidate, ChunkKey, Origin};
use groundrag_core::Corpus;
use groundrag_lexical::LexicalHit;
use groundrag_vector::VectorHit;

/// Union of lexical and vector hits keyed by `(source, page, chunk_id)`.
///
/// A chunk found by both engines becomes one `Origin::Both` candidate whose
/// `normalized_score` is the larger of the two; `raw_score` follows the origin
/// that supplied it. Vector hits are inserted first and the final sort is
/// stable, so equal scores keep vector order ahead of lexical order. Hits for
/// ids absent from the corpus (stale index) are dropped.
pub fn fuse(corpus: &Corpus, lexical: &[LexicalHit], vector: &[VectorHit]) -> Vec<Candidate> {
    let mut fused: Vec<Candidate> = Vec::with_capacity(lexical.len() + vector.len());
    let mut by_key: HashMap<ChunkKey, usize> = HashMap::new();

    let incoming = vector
        .iter()
        .map(|h| (h.chunk_id, Origin::Vector, h.distance, h.normalized_score))
        .chain(lexical.iter().map(|h| (h.chunk_id, Origin::Lexical, h.raw_score, h.normalized_score)));

    for (chunk_id, origin, raw_score, normalized_score) in incoming {
        let Some(chunk) = corpus.get(chunk_id) else {
            debug!(chunk_id, ?origin, "dropping hit for chunk missing from corpus");
            continue;
        };
        let key = chunk.key();
        match by_key.get(&key) {
            Some(&pos) => {
                let existing = &mut fused[pos];
                existing.origin = existing.origin.merge(origin);
                if normalized_score > existing.normalized_score {
                    existing.normalized_score = normalized_score;
                    existing.raw_score = raw_score;
                }
            }
            None => {
                by_key.insert(key, fused.len());
                fused.push(Candidate {
                    chunk: chunk.clone(),
                    origin,
                    raw_score,
                    normalized_score: normalized_score.clamp(0.0, 1.0),
                    rerank_score: None,
                });
            }
        }
    }

    fused.sort_by(|a, b| b.normalized_score.total_cmp(&a.normalized_score));
    fused
}
