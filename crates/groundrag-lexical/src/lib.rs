//! groundrag-lexical
//!
//! BM25 ranking over a tokenized corpus with a versioned, self-invalidating
//! on-disk snapshot cache. See `cache` for the validity rule.

pub mod bm25;
pub mod cache;
pub mod index;
pub mod tokenize;

pub use bm25::{Bm25Snapshot, LexicalHit, FORMAT_VERSION};
pub use cache::{corpus_hash, load_or_build, CacheStatus, FsSnapshotStore, LoadOutcome, RebuildReason};
pub use index::{LexicalIndex, LexicalView};
pub use tokenize::Analyzer;
