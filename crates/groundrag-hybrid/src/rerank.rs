use tracing::{debug, warn};

use groundrag_core::traits::Reranker;
use groundrag_core::types::Candidate;

/// Delegate ordering to an external reranker when one is configured.
///
/// Scores land in `rerank_score` and candidates are re-sorted by them (stable).
/// `normalized_score` is left alone so the confidence gate keeps reading
/// retrieval confidence. Any reranker failure keeps the fused order.
pub async fn rerank(reranker: Option<&dyn Reranker>, query: &str, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    let Some(reranker) = reranker else { return candidates };
    if candidates.is_empty() {
        return candidates;
    }
    let scores = {
        let passages: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
        reranker.score(query, &passages).await
    };
    match scores {
        Ok(scores) if scores.len() == candidates.len() => {
            for (c, s) in candidates.iter_mut().zip(scores) {
                c.rerank_score = Some(if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 });
            }
            candidates.sort_by(|a, b| b.relevance().total_cmp(&a.relevance()));
            debug!(candidates = candidates.len(), "reranked candidates");
        }
        Ok(scores) => warn!(expected = candidates.len(), got = scores.len(), "reranker returned wrong score count; keeping fused order"),
        Err(e) => warn!(error = %e, "reranker unavailable; keeping fused order"),
    }
    candidates
}
