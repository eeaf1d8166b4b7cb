//! Versioned on-disk cache for [`Bm25Snapshot`].
//!
//! A persisted snapshot is usable only when the sidecar hash, the blob's
//! `corpus_hash`, `k1`, `b` and `format_version` all match the current corpus
//! and parameters. Anything else (missing, unreadable, undecodable, stale)
//! triggers a synchronous rebuild that replaces blob and sidecar wholesale.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use groundrag_core::config::Bm25Params;
use groundrag_core::error::{Error, Result};
use groundrag_core::traits::SnapshotStore;
use groundrag_core::Corpus;

use crate::bm25::{Bm25Snapshot, FORMAT_VERSION};
use crate::tokenize::Analyzer;

/// First 16 hex characters of `sha256(concat(chunk.text))`, in corpus order.
pub fn corpus_hash(corpus: &Corpus) -> String {
	let mut hasher = Sha256::new();
	for chunk in corpus.iter() { hasher.update(chunk.text.as_bytes()); }
	let mut hex = hex::encode(hasher.finalize());
	hex.truncate(16);
	hex
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
	Missing,
	Corrupt,
	CorpusChanged,
	ParamsChanged,
	FormatChanged,
}

impl std::fmt::Display for RebuildReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			RebuildReason::Missing => "missing",
			RebuildReason::Corrupt => "corrupt",
			RebuildReason::CorpusChanged => "corpus_changed",
			RebuildReason::ParamsChanged => "params_changed",
			RebuildReason::FormatChanged => "format_changed",
		};
		f.write_str(s)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
	Hit,
	Rebuilt(RebuildReason),
}

impl std::fmt::Display for CacheStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CacheStatus::Hit => f.write_str("hit"),
			CacheStatus::Rebuilt(reason) => write!(f, "rebuilt ({reason})"),
		}
	}
}

#[derive(Debug)]
pub struct LoadOutcome {
	pub snapshot: Bm25Snapshot,
	pub status: CacheStatus,
}

#[derive(Deserialize)]
struct BlobHeader {
	format_version: u32,
}

/// Check the persisted snapshot against the current corpus hash and params.
pub fn check_cached(store: &dyn SnapshotStore, corpus_hash: &str, params: Bm25Params) -> std::result::Result<Bm25Snapshot, RebuildReason> {
	let sidecar = match store.read_sidecar() {
		Ok(Some(h)) => h,
		Ok(None) => return Err(RebuildReason::Missing),
		Err(e) => { warn!(error = %e, "snapshot sidecar unreadable"); return Err(RebuildReason::Corrupt); }
	};
	if sidecar != corpus_hash { return Err(RebuildReason::CorpusChanged); }
	let blob = match store.read_blob() {
		Ok(Some(b)) => b,
		Ok(None) => return Err(RebuildReason::Missing),
		Err(e) => { warn!(error = %e, "snapshot blob unreadable"); return Err(RebuildReason::Corrupt); }
	};
	let header: BlobHeader = serde_json::from_slice(&blob).map_err(|_| RebuildReason::Corrupt)?;
	if header.format_version != FORMAT_VERSION { return Err(RebuildReason::FormatChanged); }
	let snapshot: Bm25Snapshot = serde_json::from_slice(&blob).map_err(|_| RebuildReason::Corrupt)?;
	if snapshot.corpus_hash != corpus_hash { return Err(RebuildReason::CorpusChanged); }
	if snapshot.k1 != params.k1 || snapshot.b != params.b { return Err(RebuildReason::ParamsChanged); }
	if snapshot.doc_count != snapshot.doc_lengths.len() { return Err(RebuildReason::Corrupt); }
	Ok(snapshot)
}

/// Serialize, verify the bytes decode back to the same snapshot, then hand
/// them to the store for an atomic replace.
pub fn persist(store: &dyn SnapshotStore, snapshot: &Bm25Snapshot) -> Result<()> {
	let blob = serde_json::to_vec(snapshot)?;
	let decoded: Bm25Snapshot = serde_json::from_slice(&blob)?;
	if &decoded != snapshot {
		return Err(Error::CacheCorrupt("snapshot does not survive serialization".into()));
	}
	store.write(&blob, &snapshot.corpus_hash).map_err(|e| Error::CacheCorrupt(e.to_string()))
}

pub fn load_or_build(corpus: &Corpus, params: Bm25Params, store: &dyn SnapshotStore, analyzer: &Analyzer) -> Result<LoadOutcome> {
	let hash = corpus_hash(corpus);
	let reason = match check_cached(store, &hash, params) {
		Ok(snapshot) => {
			debug!(corpus_hash = %hash, "lexical snapshot cache hit");
			return Ok(LoadOutcome { snapshot, status: CacheStatus::Hit });
		}
		Err(reason) => reason,
	};
	info!(corpus_hash = %hash, rebuild_reason = %reason, chunks = corpus.len(), "rebuilding lexical snapshot");
	let snapshot = Bm25Snapshot::build(corpus, params, hash, analyzer)?;
	if let Err(e) = persist(store, &snapshot) {
		warn!(error = %e, "lexical snapshot not persisted; serving in-memory copy");
	}
	Ok(LoadOutcome { snapshot, status: CacheStatus::Rebuilt(reason) })
}

/// Snapshot blob plus sidecar in one directory.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
	dir: PathBuf,
	blob_path: PathBuf,
	sidecar_path: PathBuf,
}

impl FsSnapshotStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		let dir = dir.into();
		let blob_path = dir.join("bm25_snapshot.json");
		let sidecar_path = dir.join("bm25_snapshot.hash");
		Self { dir, blob_path, sidecar_path }
	}

	pub fn blob_path(&self) -> &Path { &self.blob_path }

	pub fn sidecar_path(&self) -> &Path { &self.sidecar_path }
}

fn read_optional(path: &Path) -> anyhow::Result<Option<Vec<u8>>> {
	match fs::read(path) {
		Ok(bytes) => Ok(Some(bytes)),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow::anyhow!("reading {}: {}", path.display(), e)),
	}
}

/// Write to a temp file in the target directory, fsync, read back, then rename.
fn atomic_write(dir: &Path, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
	let mut tmp = NamedTempFile::new_in(dir)?;
	tmp.write_all(bytes)?;
	tmp.as_file().sync_all()?;
	if fs::read(tmp.path())? != bytes {
		anyhow::bail!("temp file {} does not match written bytes", tmp.path().display());
	}
	tmp.persist(path).map_err(|e| e.error)?;
	Ok(())
}

impl SnapshotStore for FsSnapshotStore {
	fn read_sidecar(&self) -> anyhow::Result<Option<String>> {
		Ok(read_optional(&self.sidecar_path)?.map(|b| String::from_utf8_lossy(&b).trim().to_string()))
	}

	fn read_blob(&self) -> anyhow::Result<Option<Vec<u8>>> { read_optional(&self.blob_path) }

	fn write(&self, blob: &[u8], corpus_hash: &str) -> anyhow::Result<()> {
		fs::create_dir_all(&self.dir)?;
		// blob first; it carries its own hash and params, so a stale sidecar cannot validate it
		atomic_write(&self.dir, &self.blob_path, blob)?;
		atomic_write(&self.dir, &self.sidecar_path, corpus_hash.as_bytes())?;
		Ok(())
	}
}
