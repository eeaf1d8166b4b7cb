use std::collections::HashSet;

use groundrag_core::types::{Candidate, EvidenceSet};
use groundrag_lexical::Analyzer;

/// Pairwise similarity between candidates, computed over precomputed features.
pub trait Similarity {
    type Features;
    fn features(&self, candidate: &Candidate) -> Self::Features;
    /// Symmetric, in `[0, 1]`.
    fn similarity(&self, a: &Self::Features, b: &Self::Features) -> f32;
}

/// Jaccard overlap of analyzer token sets.
#[derive(Debug, Clone, Default)]
pub struct TokenJaccard {
    analyzer: Analyzer,
}

impl TokenJaccard {
    pub fn new(analyzer: Analyzer) -> Self { Self { analyzer } }
}

impl Similarity for TokenJaccard {
    type Features = HashSet<String>;

    fn features(&self, candidate: &Candidate) -> HashSet<String> {
        self.analyzer.tokens(&candidate.chunk.text).into_iter().collect()
    }

    fn similarity(&self, a: &HashSet<String>, b: &HashSet<String>) -> f32 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        let inter = a.intersection(b).count() as f32;
        let union = a.union(b).count() as f32;
        inter / union
    }
}

/// Greedy Maximal Marginal Relevance selection of at most `top_n` candidates.
///
/// Each step picks the candidate maximising
/// `lambda * relevance - (1 - lambda) * max_similarity(selected)`; the first
/// pick is therefore the most relevant one. Ties go to the earlier candidate.
/// Fewer candidates than `top_n` returns all of them, unpadded.
pub fn select_mmr<S: Similarity>(candidates: Vec<Candidate>, top_n: usize, lambda: f32, sim: &S) -> EvidenceSet {
    if candidates.is_empty() || top_n == 0 {
        return EvidenceSet::empty();
    }
    let lambda = lambda.clamp(0.0, 1.0);
    let features: Vec<S::Features> = candidates.iter().map(|c| sim.features(c)).collect();
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(top_n.min(candidates.len()));

    while selected.len() < top_n && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (slot, &i) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&j| sim.similarity(&features[i], &features[j]))
                .fold(0.0f32, f32::max);
            let score = lambda * candidates[i].relevance() - (1.0 - lambda) * redundancy;
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((slot, score));
            }
        }
        let Some((slot, _)) = best else { break };
        selected.push(remaining.remove(slot));
    }

    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    EvidenceSet::new(selected.into_iter().filter_map(|i| slots[i].take()).collect())
}
