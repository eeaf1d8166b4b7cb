//! Read-only corpus of document chunks.
//!
//! Chunking happens upstream; this module only loads what ingestion produced,
//! either a JSON Lines manifest of [`DocumentChunk`]s or a directory of `.txt`
//! files where form feeds separate pages and blank lines separate chunks.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{ChunkId, DocumentChunk};

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    chunks: Vec<Arc<DocumentChunk>>,
    by_id: HashMap<ChunkId, usize>,
}

impl Corpus {
    pub fn new(chunks: Vec<DocumentChunk>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(chunks.len());
        for (pos, chunk) in chunks.iter().enumerate() {
            if by_id.insert(chunk.id, pos).is_some() {
                return Err(Error::CorpusInvalid(format!("duplicate chunk id {}", chunk.id)));
            }
        }
        Ok(Self { chunks: chunks.into_iter().map(Arc::new).collect(), by_id })
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn get(&self, id: ChunkId) -> Option<&Arc<DocumentChunk>> {
        self.by_id.get(&id).map(|&pos| &self.chunks[pos])
    }

    /// Chunks in load order. Order is part of the corpus identity.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DocumentChunk>> { self.chunks.iter() }

    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::CorpusInvalid(format!("{}: {}", path.display(), e)))?;
        let mut chunks = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() { continue; }
            let mut chunk: DocumentChunk = serde_json::from_str(line)
                .map_err(|e| Error::CorpusInvalid(format!("{}:{}: {}", path.display(), line_no + 1, e)))?;
            if chunk.token_count == 0 { chunk.token_count = chunk.text.split_whitespace().count(); }
            chunks.push(chunk);
        }
        info!(path = %path.display(), chunks = chunks.len(), "loaded corpus manifest");
        Self::new(chunks)
    }

    pub fn load_txt_dir(dir: &Path) -> Result<Self> {
        let files = list_txt_files(dir);
        let mut chunks = Vec::new();
        let mut next_id: ChunkId = 0;
        for file_path in &files {
            let content = read_file_content(file_path)?;
            let source = file_path.strip_prefix(dir).unwrap_or(file_path).to_string_lossy().to_string();
            let paginated = content.contains('\x0c');
            for (page_idx, page) in content.split('\x0c').enumerate() {
                let page_no = if paginated { Some(page_idx as u32 + 1) } else { None };
                for paragraph in page.split("\n\n") {
                    let paragraph = paragraph.trim();
                    if paragraph.is_empty() { continue; }
                    chunks.push(DocumentChunk::new(next_id, source.clone(), page_no, paragraph));
                    next_id += 1;
                }
            }
            debug!(file = %file_path.display(), "chunked text file");
        }
        info!(dir = %dir.display(), files = files.len(), chunks = chunks.len(), "loaded text corpus");
        Self::new(chunks)
    }

    /// Load from a `.jsonl` manifest or a directory of `.txt` files.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::load_txt_dir(path)
        } else if path.exists() {
            Self::load_jsonl(path)
        } else {
            Err(Error::NotFound(format!("corpus at {}", path.display())))
        }
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}
