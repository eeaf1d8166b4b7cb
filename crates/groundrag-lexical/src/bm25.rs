use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use groundrag_core::config::Bm25Params;
use groundrag_core::error::{Error, Result};
use groundrag_core::types::ChunkId;
use groundrag_core::Corpus;

use crate::tokenize::Analyzer;

/// Bumped whenever the blob layout or the analyzer changes.
pub const FORMAT_VERSION: u32 = 1;

/// Immutable BM25 postings over one corpus and one `(k1, b)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Snapshot {
	pub format_version: u32,
	pub k1: f64,
	pub b: f64,
	pub corpus_hash: String,
	pub doc_count: usize,
	pub avg_doc_length: f64,
	pub doc_lengths: BTreeMap<ChunkId, u32>,
	/// term -> [(chunk_id, term_frequency)] sorted by chunk id
	pub postings: BTreeMap<String, Vec<(ChunkId, u32)>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalHit {
	pub chunk_id: ChunkId,
	pub raw_score: f32,
	/// `raw_score` over the query's reference score, clamped to `[0, 1]`.
	pub normalized_score: f32,
}

impl Bm25Snapshot {
	pub fn build(corpus: &Corpus, params: Bm25Params, corpus_hash: String, analyzer: &Analyzer) -> Result<Self> {
		if !(params.k1.is_finite() && params.k1 > 0.0) || !(0.0..=1.0).contains(&params.b) {
			return Err(Error::InvalidConfig(format!("bm25 parameters out of range: k1={}, b={}", params.k1, params.b)));
		}
		let mut doc_lengths = BTreeMap::new();
		let mut postings: BTreeMap<String, BTreeMap<ChunkId, u32>> = BTreeMap::new();
		let mut total_len: u64 = 0;
		for chunk in corpus.iter() {
			let terms = analyzer.tokens(&chunk.text);
			let len = if chunk.token_count > 0 { chunk.token_count } else { terms.len() };
			let len = u32::try_from(len).unwrap_or(u32::MAX);
			total_len += u64::from(len);
			doc_lengths.insert(chunk.id, len);
			for term in terms {
				*postings.entry(term).or_default().entry(chunk.id).or_insert(0) += 1;
			}
		}
		let doc_count = doc_lengths.len();
		let avg_doc_length = if doc_count == 0 { 0.0 } else { total_len as f64 / doc_count as f64 };
		let postings: BTreeMap<String, Vec<(ChunkId, u32)>> =
			postings.into_iter().map(|(t, docs)| (t, docs.into_iter().collect::<Vec<_>>())).collect();
		Ok(Self { format_version: FORMAT_VERSION, k1: params.k1, b: params.b, corpus_hash, doc_count, avg_doc_length, doc_lengths, postings })
	}

	pub fn idf(&self, term: &str) -> f64 {
		let df = self.postings.get(term).map_or(0, Vec::len) as f64;
		let n = self.doc_count as f64;
		(1.0 + (n - df + 0.5) / (df + 0.5)).ln()
	}

	/// Rank every chunk containing at least one query term.
	///
	/// Duplicate query terms count once. The normalisation reference is the
	/// sum of idf over the query terms, i.e. the score of an average-length
	/// chunk holding each term once; terms unknown to the corpus still add
	/// their idf to the reference, so off-corpus queries normalise low.
	pub fn score(&self, query_terms: &[String]) -> Vec<LexicalHit> {
		let terms: BTreeSet<&str> = query_terms.iter().map(String::as_str).collect();
		let mut acc: HashMap<ChunkId, f64> = HashMap::new();
		let mut reference = 0.0;
		for term in terms {
			let idf = self.idf(term);
			reference += idf;
			let Some(docs) = self.postings.get(term) else { continue };
			for &(chunk_id, tf) in docs {
				let dl = f64::from(self.doc_lengths.get(&chunk_id).copied().unwrap_or(0));
				let length_norm = if self.avg_doc_length > 0.0 { 1.0 - self.b + self.b * dl / self.avg_doc_length } else { 1.0 };
				let tf = f64::from(tf);
				*acc.entry(chunk_id).or_insert(0.0) += idf * tf * (self.k1 + 1.0) / (tf + self.k1 * length_norm);
			}
		}
		let mut hits: Vec<LexicalHit> = acc
			.into_iter()
			.map(|(chunk_id, raw)| {
				let normalized = if reference > 0.0 { (raw / reference).min(1.0) } else { 0.0 };
				LexicalHit { chunk_id, raw_score: raw as f32, normalized_score: normalized as f32 }
			})
			.collect();
		hits.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score).then(a.chunk_id.cmp(&b.chunk_id)));
		hits
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use groundrag_core::types::DocumentChunk;

	fn corpus() -> Corpus {
		Corpus::new(vec![
			DocumentChunk::new(0, "manual", Some(1), "Engine oil capacity is 4.5 quarts with filter."),
			DocumentChunk::new(1, "manual", Some(2), "Tire pressure should be 35 psi when cold."),
			DocumentChunk::new(2, "manual", Some(3), "Check the oil level every month and top up oil as needed."),
		])
		.unwrap()
	}

	fn terms(a: &Analyzer, q: &str) -> Vec<String> { a.tokens(q) }

	#[test]
	fn builds_postings_and_lengths() {
		let a = Analyzer::new();
		let s = Bm25Snapshot::build(&corpus(), Bm25Params::default(), "h".into(), &a).unwrap();
		assert_eq!(s.doc_count, 3);
		assert_eq!(s.postings["oil"], vec![(0, 1), (2, 2)]);
		let mean = (8.0 + 8.0 + 12.0) / 3.0;
		assert!((s.avg_doc_length - mean).abs() < 1e-9);
	}

	#[test]
	fn ranks_and_normalizes() {
		let a = Analyzer::new();
		let s = Bm25Snapshot::build(&corpus(), Bm25Params::default(), "h".into(), &a).unwrap();
		let hits = s.score(&terms(&a, "oil capacity"));
		assert_eq!(hits[0].chunk_id, 0);
		assert_eq!(hits.len(), 2);
		assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.normalized_score)));
		assert!(hits[0].normalized_score > 0.8, "full coverage scores high: {}", hits[0].normalized_score);
	}

	#[test]
	fn unknown_terms_depress_normalized_score() {
		let a = Analyzer::new();
		let s = Bm25Snapshot::build(&corpus(), Bm25Params::default(), "h".into(), &a).unwrap();
		assert!(s.score(&terms(&a, "warp core")).is_empty());
		let partial = s.score(&terms(&a, "warp core tire"));
		assert_eq!(partial[0].chunk_id, 1);
		assert!(partial[0].normalized_score < 0.5);
	}

	#[test]
	fn rejects_invalid_params() {
		let a = Analyzer::new();
		let bad = Bm25Params { k1: 0.0, b: 0.75 };
		assert!(Bm25Snapshot::build(&corpus(), bad, "h".into(), &a).is_err());
	}
}
