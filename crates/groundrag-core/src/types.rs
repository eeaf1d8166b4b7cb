//! Domain types shared by the retrieval, guard and audit stages.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type ChunkId = u64;

/// A chunk of a source document that is independently indexed.
///
/// - `id`: stable integer identifier, unique within a corpus
/// - `text`: the text payload of the chunk
/// - `source`: document name the chunk was cut from
/// - `page`: page within the source, when the source is paginated
/// - `token_count`: whitespace token count recorded at ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub token_count: usize,
}

impl DocumentChunk {
    pub fn new(id: ChunkId, source: impl Into<String>, page: Option<u32>, text: impl Into<String>) -> Self {
        let text = text.into();
        let token_count = text.split_whitespace().count();
        Self { id, text, source: source.into(), page, token_count }
    }

    pub fn key(&self) -> ChunkKey {
        ChunkKey { source: self.source.clone(), page: self.page, id: self.id }
    }
}

/// Identity of a chunk across retrieval origins: `(source, page, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub source: String,
    pub page: Option<u32>,
    pub id: ChunkId,
}

/// Indicates which retrieval engine(s) produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Lexical,
    Vector,
    Both,
}

impl Origin {
    pub fn merge(self, other: Origin) -> Origin {
        if self == other { self } else { Origin::Both }
    }
}

/// A retrieval hit living for the duration of one query.
///
/// `raw_score` is origin-specific (BM25 score or vector distance) and is not
/// comparable across origins. `normalized_score` is in `[0, 1]` and is the
/// only score the confidence gate reads. `rerank_score` is set by an optional
/// reranker and only influences diversification order.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Arc<DocumentChunk>,
    pub origin: Origin,
    pub raw_score: f32,
    pub normalized_score: f32,
    pub rerank_score: Option<f32>,
}

impl Candidate {
    pub fn chunk_id(&self) -> ChunkId { self.chunk.id }

    pub fn key(&self) -> ChunkKey { self.chunk.key() }

    /// Relevance used for ordering: the rerank score when present.
    pub fn relevance(&self) -> f32 { self.rerank_score.unwrap_or(self.normalized_score) }

    pub fn snippet(&self) -> Snippet {
        Snippet {
            chunk_id: self.chunk.id,
            source: self.chunk.source.clone(),
            page: self.chunk.page,
            text: self.chunk.text.clone(),
        }
    }
}

/// Ordered candidates that survived fusion and diversification.
#[derive(Debug, Clone, Default)]
pub struct EvidenceSet {
    items: Vec<Candidate>,
}

impl EvidenceSet {
    pub fn new(items: Vec<Candidate>) -> Self { Self { items } }

    pub fn empty() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> { self.items.iter() }

    pub fn get(&self, index: usize) -> Option<&Candidate> { self.items.get(index) }

    pub fn candidates(&self) -> &[Candidate] { &self.items }

    /// Arithmetic mean of `normalized_score`; `0.0` for an empty set.
    pub fn mean_confidence(&self) -> f32 {
        if self.items.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.items.iter().map(|c| c.normalized_score).sum();
        sum / self.items.len() as f32
    }

    /// The first `n` evidence chunks as verbatim snippets.
    pub fn snippets(&self, n: usize) -> Vec<Snippet> {
        self.items.iter().take(n).map(Candidate::snippet).collect()
    }
}

impl<'a> IntoIterator for &'a EvidenceSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter { self.items.iter() }
}

/// Verbatim evidence text returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub chunk_id: ChunkId,
    pub source: String,
    pub page: Option<u32>,
    pub text: String,
}

/// A reference from an answer to the evidence block it relies on.
/// `index` is the 1-based position of the chunk in the evidence set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub chunk_id: ChunkId,
    pub source: String,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn is_safe(self) -> bool { matches!(self, RiskTier::Low | RiskTier::Medium) }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// An injection-stripped sub-question and the tier the classifier gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSegment {
    pub text: String,
    pub tier: RiskTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    FullyCited,
    PartiallyCited,
    Uncited,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditStatus::FullyCited => "fully_cited",
            AuditStatus::PartiallyCited => "partially_cited",
            AuditStatus::Uncited => "uncited",
        };
        f.write_str(s)
    }
}

/// One factual claim of a generated answer and the evidence backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimLink {
    pub claim: String,
    pub supporting: Vec<ChunkId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fabricated_references: Vec<String>,
}

impl ClaimLink {
    pub fn is_supported(&self) -> bool { !self.supporting.is_empty() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditVerdict {
    pub status: AuditStatus,
    pub claims: Vec<ClaimLink>,
}

impl AuditVerdict {
    pub fn is_fully_cited(&self) -> bool { self.status == AuditStatus::FullyCited }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbstentionReason {
    NoEvidence,
    LowConfidence { confidence: f32, threshold: f32 },
    GenerationUnavailable { detail: String },
    CitationAudit { verdict: AuditVerdict },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefusalReason {
    InputInvalid { detail: String },
    EmptyAfterStripping,
    UnsafeIntent { segments: Vec<RiskSegment> },
    ClassifierUnavailable { detail: String },
}

/// The only shapes a query can resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Answer {
        text: String,
        citations: Vec<Citation>,
        audit: AuditVerdict,
        confidence: f32,
    },
    Abstention {
        extractive_snippets: Vec<Snippet>,
        reason: AbstentionReason,
    },
    Refusal {
        reason: RefusalReason,
        original_text: String,
    },
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Answer { .. } => "answer",
            Response::Abstention { .. } => "abstention",
            Response::Refusal { .. } => "refusal",
        }
    }
}
