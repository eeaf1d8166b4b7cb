use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use groundrag_core::config::Bm25Params;
use groundrag_core::error::{Error, Result};
use groundrag_core::traits::SnapshotStore;
use groundrag_core::Corpus;

use crate::bm25::{Bm25Snapshot, LexicalHit};
use crate::cache::{load_or_build, CacheStatus};
use crate::tokenize::Analyzer;

#[derive(Clone)]
enum SnapshotState {
	Ready { snapshot: Arc<Bm25Snapshot>, status: CacheStatus },
	Unavailable(String),
}

/// A corpus together with the snapshot built from it. Always read and
/// replaced as one unit.
#[derive(Clone)]
pub struct LexicalView {
	corpus: Arc<Corpus>,
	state: SnapshotState,
}

impl LexicalView {
	pub fn corpus(&self) -> &Arc<Corpus> { &self.corpus }

	pub fn snapshot(&self) -> Option<&Arc<Bm25Snapshot>> {
		match &self.state {
			SnapshotState::Ready { snapshot, .. } => Some(snapshot),
			SnapshotState::Unavailable(_) => None,
		}
	}
}

/// Lexical index serving an immutable `(corpus, snapshot)` pair.
///
/// Readers clone the current view under a short read lock and score without
/// holding it. `rebuild` builds off-lock and swaps corpus and snapshot
/// together, so a query sees either the previous pair or the new one, never a
/// partial build and never a snapshot paired with another corpus.
pub struct LexicalIndex {
	view: RwLock<LexicalView>,
	store: Arc<dyn SnapshotStore>,
	params: Bm25Params,
	analyzer: Analyzer,
}

impl LexicalIndex {
	pub fn open(corpus: impl Into<Arc<Corpus>>, params: Bm25Params, store: Arc<dyn SnapshotStore>) -> Self {
		let analyzer = Analyzer::new();
		let view = Self::load(corpus.into(), params, store.as_ref(), &analyzer);
		Self { view: RwLock::new(view), store, params, analyzer }
	}

	fn load(corpus: Arc<Corpus>, params: Bm25Params, store: &dyn SnapshotStore, analyzer: &Analyzer) -> LexicalView {
		let state = match load_or_build(&corpus, params, store, analyzer) {
			Ok(outcome) => {
				info!(cache = %outcome.status, docs = outcome.snapshot.doc_count, "lexical index ready");
				SnapshotState::Ready { snapshot: Arc::new(outcome.snapshot), status: outcome.status }
			}
			Err(e) => {
				error!(error = %e, "lexical index unavailable; retrieval degrades to vector-only");
				SnapshotState::Unavailable(e.to_string())
			}
		};
		LexicalView { corpus, state }
	}

	/// The current corpus and snapshot, taken together.
	pub fn view(&self) -> LexicalView {
		match self.view.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	pub fn corpus(&self) -> Arc<Corpus> { self.view().corpus }

	pub fn snapshot(&self) -> Option<Arc<Bm25Snapshot>> { self.view().snapshot().cloned() }

	pub fn cache_status(&self) -> Option<CacheStatus> {
		match self.view().state {
			SnapshotState::Ready { status, .. } => Some(status),
			SnapshotState::Unavailable(_) => None,
		}
	}

	/// Why the index is unavailable, if it is.
	pub fn unavailable_reason(&self) -> Option<String> {
		match self.view().state {
			SnapshotState::Ready { .. } => None,
			SnapshotState::Unavailable(reason) => Some(reason),
		}
	}

	/// The current snapshot, or `IndexUnavailable` carrying the build error.
	pub fn ready(&self) -> Result<Arc<Bm25Snapshot>> {
		match self.view().state {
			SnapshotState::Ready { snapshot, .. } => Ok(snapshot),
			SnapshotState::Unavailable(reason) => Err(Error::IndexUnavailable(reason)),
		}
	}

	pub fn is_available(&self) -> bool { self.snapshot().is_some() }

	pub fn params(&self) -> Bm25Params { self.params }

	pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

	/// Top `k` hits against the current snapshot; empty when unavailable.
	pub fn search(&self, query: &str, k: usize) -> Vec<LexicalHit> { self.search_view(&self.view(), query, k) }

	/// Top `k` hits against the snapshot of `view`. Hit ids resolve against
	/// `view.corpus()`.
	pub fn search_view(&self, view: &LexicalView, query: &str, k: usize) -> Vec<LexicalHit> {
		let Some(snapshot) = view.snapshot() else {
			debug!("lexical index unavailable; no lexical candidates");
			return Vec::new();
		};
		let terms = self.analyzer.tokens(query);
		let mut hits = snapshot.score(&terms);
		hits.truncate(k);
		hits
	}

	/// Revalidate against `corpus` and swap in the new corpus and snapshot.
	pub fn rebuild(&self, corpus: impl Into<Arc<Corpus>>) -> Option<CacheStatus> {
		let next = Self::load(corpus.into(), self.params, self.store.as_ref(), &self.analyzer);
		let status = match &next.state {
			SnapshotState::Ready { status, .. } => Some(*status),
			SnapshotState::Unavailable(_) => None,
		};
		match self.view.write() {
			Ok(mut guard) => *guard = next,
			Err(poisoned) => *poisoned.into_inner() = next,
		}
		status
	}
}
