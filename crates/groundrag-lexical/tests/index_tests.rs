use std::sync::Arc;

use tempfile::TempDir;

use groundrag_core::config::Bm25Params;
use groundrag_core::error::Error;
use groundrag_core::traits::SnapshotStore;
use groundrag_core::types::DocumentChunk;
use groundrag_core::Corpus;
use groundrag_lexical::{corpus_hash, CacheStatus, FsSnapshotStore, LexicalIndex, RebuildReason};

fn corpus(extra: &str) -> Corpus {
	Corpus::new(vec![
		DocumentChunk::new(1, "manual.pdf", Some(12), "The oil capacity is 4.5 quarts."),
		DocumentChunk::new(2, "manual.pdf", Some(40), "Tire pressure is 35 psi."),
		DocumentChunk::new(3, "manual.pdf", Some(41), extra),
	])
	.unwrap()
}

fn store(tmp: &TempDir) -> Arc<dyn SnapshotStore> { Arc::new(FsSnapshotStore::new(tmp.path())) }

#[test]
fn search_ranks_matching_chunk_first() {
	let tmp = TempDir::new().unwrap();
	let index = LexicalIndex::open(corpus("Replace wiper blades."), Bm25Params::default(), store(&tmp));
	assert!(index.is_available());
	let hits = index.search("What is the oil capacity?", 10);
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].chunk_id, 1);
	assert!(hits[0].normalized_score >= 0.8);
	assert!(index.search("warp core temperature", 10).is_empty());
}

#[test]
fn search_truncates_to_k() {
	let tmp = TempDir::new().unwrap();
	let index = LexicalIndex::open(corpus("Check the oil and the tire pressure."), Bm25Params::default(), store(&tmp));
	assert_eq!(index.search("oil tire", 1).len(), 1);
	assert_eq!(index.search("oil tire", 10).len(), 3);
}

#[test]
fn reopening_hits_the_cache() {
	let tmp = TempDir::new().unwrap();
	let c = corpus("Replace wiper blades.");
	let first = LexicalIndex::open(c.clone(), Bm25Params::default(), store(&tmp));
	assert_eq!(first.cache_status(), Some(CacheStatus::Rebuilt(RebuildReason::Missing)));
	let second = LexicalIndex::open(c.clone(), Bm25Params::default(), store(&tmp));
	assert_eq!(second.cache_status(), Some(CacheStatus::Hit));
}

#[test]
fn invalid_params_mark_index_unavailable() {
	let tmp = TempDir::new().unwrap();
	let index = LexicalIndex::open(corpus("x"), Bm25Params { k1: -1.0, b: 0.75 }, store(&tmp));
	assert!(!index.is_available());
	assert!(index.unavailable_reason().is_some());
	assert!(matches!(index.ready(), Err(Error::IndexUnavailable(_))));
	assert!(index.search("oil", 5).is_empty());
}

#[test]
fn rebuild_swaps_snapshot_and_keeps_old_readers_valid() {
	let tmp = TempDir::new().unwrap();
	let index = LexicalIndex::open(corpus("Replace wiper blades."), Bm25Params::default(), store(&tmp));
	let old = index.snapshot().unwrap();

	let status = index.rebuild(corpus("Coolant is a 50/50 mix."));
	assert_eq!(status, Some(CacheStatus::Rebuilt(RebuildReason::CorpusChanged)));
	let new = index.snapshot().unwrap();
	assert_ne!(old.corpus_hash, new.corpus_hash);
	assert!(old.postings.contains_key("wiper"), "held snapshot is untouched");
	assert_eq!(index.search("coolant", 5)[0].chunk_id, 3);
	assert!(index.search("wiper", 5).is_empty());
}

#[test]
fn concurrent_readers_never_see_partial_snapshot() {
	let tmp = TempDir::new().unwrap();
	let index = LexicalIndex::open(corpus("Replace wiper blades."), Bm25Params::default(), store(&tmp));
	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				for _ in 0..200 {
					let snap = index.snapshot().expect("available");
					assert_eq!(snap.doc_count, snap.doc_lengths.len());
					assert_eq!(snap.doc_count, 3);
					let _ = index.search("oil", 3);
				}
			});
		}
		s.spawn(|| {
			for i in 0..20 {
				index.rebuild(corpus(&format!("Revision {i} of the wiper procedure.")));
			}
		});
	});
	assert!(index.is_available());
}

#[test]
fn held_view_keeps_corpus_and_snapshot_paired_across_rebuild() {
	let tmp = TempDir::new().unwrap();
	let index = LexicalIndex::open(corpus("Replace wiper blades."), Bm25Params::default(), store(&tmp));
	let before = index.view();

	index.rebuild(corpus("Coolant is a 50/50 mix."));
	let after = index.view();

	assert_eq!(before.corpus().get(3).unwrap().text, "Replace wiper blades.");
	assert_eq!(before.snapshot().unwrap().corpus_hash, corpus_hash(before.corpus()));
	assert_eq!(index.search_view(&before, "wiper", 5)[0].chunk_id, 3);
	assert!(index.search_view(&before, "coolant", 5).is_empty());

	assert_eq!(after.corpus().get(3).unwrap().text, "Coolant is a 50/50 mix.");
	assert_eq!(after.snapshot().unwrap().corpus_hash, corpus_hash(after.corpus()));
	assert_eq!(index.corpus().get(3).unwrap().text, "Coolant is a 50/50 mix.");
}

#[test]
fn concurrent_views_never_mix_corpus_and_snapshot() {
	let tmp = TempDir::new().unwrap();
	let index = LexicalIndex::open(corpus("Revision wiper procedure."), Bm25Params::default(), store(&tmp));
	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				for _ in 0..200 {
					let view = index.view();
					let snapshot = view.snapshot().expect("available");
					assert_eq!(snapshot.corpus_hash, corpus_hash(view.corpus()));
					for hit in index.search_view(&view, "revision", 3) {
						let chunk = view.corpus().get(hit.chunk_id).expect("hit resolves in its own corpus");
						assert!(chunk.text.to_lowercase().contains("revision"));
					}
				}
			});
		}
		s.spawn(|| {
			for i in 0..20 {
				let text = if i % 2 == 0 { format!("Revision {i} of the wiper procedure.") } else { "Coolant is a 50/50 mix.".to_string() };
				index.rebuild(corpus(&text));
			}
		});
	});
}
