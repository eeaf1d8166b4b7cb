use std::collections::HashSet;

use tracing::{debug, info};

use groundrag_core::config::AuditConfig;
use groundrag_core::types::{AuditStatus, AuditVerdict, ChunkId, ClaimLink, EvidenceSet};
use groundrag_lexical::Analyzer;

use crate::claims::{split_claims, Claim};
use crate::matching::{coverage, normalize, numbers, references, strip_references};

/// Evidence text precomputed once per audit.
struct Prepared {
    id: ChunkId,
    page: Option<u32>,
    normalized: String,
    numbers: HashSet<String>,
    sentences: Vec<Sentence>,
}

/// One evidence sentence. Support is judged per sentence so a figure is only
/// accepted next to the wording it belongs to.
struct Sentence {
    normalized: String,
    numbers: HashSet<String>,
    words: HashSet<String>,
}

/// Checks every sentence of a generated answer against the evidence set.
///
/// A claim is supported by a chunk when one sentence of that chunk holds all
/// of the claim's numbers verbatim and either contains the claim's wording or
/// shares at least `min_token_coverage` of its non-numeric content tokens. A reference to a
/// section, figure, page (and similar) that no chunk contains, or a `[n]`
/// marker past the end of the evidence, marks the whole answer uncited.
#[derive(Debug, Clone)]
pub struct CitationAuditor {
    analyzer: Analyzer,
    min_token_coverage: f32,
}

impl CitationAuditor {
    pub fn new(min_token_coverage: f32) -> Self {
        Self { analyzer: Analyzer::new(), min_token_coverage: min_token_coverage.clamp(0.0, 1.0) }
    }

    pub fn from_config(config: &AuditConfig) -> Self { Self::new(config.min_token_coverage) }

    pub fn audit(&self, text: &str, evidence: &EvidenceSet) -> AuditVerdict {
        let prepared: Vec<Prepared> = evidence
            .iter()
            .map(|c| Prepared {
                id: c.chunk.id,
                page: c.chunk.page,
                normalized: normalize(&c.chunk.text),
                numbers: numbers(&c.chunk.text).into_iter().collect(),
                sentences: split_claims(&c.chunk.text).iter().map(|s| self.sentence(&s.text)).collect(),
            })
            .collect();

        let claims: Vec<ClaimLink> = split_claims(text)
            .into_iter()
            .filter_map(|claim| self.link(claim, &prepared))
            .collect();

        let fabricated = claims.iter().any(|c| !c.fabricated_references.is_empty());
        let supported = claims.iter().filter(|c| c.is_supported()).count();
        let status = if fabricated || supported == 0 {
            AuditStatus::Uncited
        } else if supported == claims.len() {
            AuditStatus::FullyCited
        } else {
            AuditStatus::PartiallyCited
        };
        info!(audit_status = %status, claims = claims.len(), supported, fabricated, "citation audit complete");
        AuditVerdict { status, claims }
    }

    fn sentence(&self, text: &str) -> Sentence {
        Sentence { normalized: normalize(text), numbers: numbers(text).into_iter().collect(), words: self.words(text) }
    }

    /// Analyzer tokens that are not bare digit runs; numbers are matched separately.
    fn words(&self, text: &str) -> HashSet<String> {
        self.analyzer.tokens(text).into_iter().filter(|t| !t.chars().all(|c| c.is_ascii_digit())).collect()
    }

    /// `None` for sentences without any content token.
    fn link(&self, claim: Claim, evidence: &[Prepared]) -> Option<ClaimLink> {
        let body = strip_references(&claim.text);
        let tokens: HashSet<String> = self.analyzer.tokens(&body).into_iter().collect();
        let refs = references(&claim.text);
        if tokens.is_empty() && refs.is_empty() {
            return None;
        }
        let claim_numbers = numbers(&body);
        let normalized = normalize(&body);
        let words = self.words(&body);

        let supports = |s: &Sentence| {
            claim_numbers.iter().all(|n| s.numbers.contains(n))
                && ((!tokens.is_empty() && s.normalized.contains(&normalized))
                    || coverage(&words, &s.words) >= self.min_token_coverage)
        };
        let supporting: Vec<ChunkId> =
            evidence.iter().filter(|e| e.sentences.iter().any(&supports)).map(|e| e.id).collect();

        let mut unsupported_numbers: Vec<String> = Vec::new();
        for n in claim_numbers {
            if !evidence.iter().any(|e| e.numbers.contains(&n)) && !unsupported_numbers.contains(&n) {
                unsupported_numbers.push(n);
            }
        }

        let mut fabricated_references: Vec<String> = refs
            .into_iter()
            .filter(|(kind, id)| !reference_exists(kind, id, evidence))
            .map(|(kind, id)| format!("{kind} {id}"))
            .collect();
        fabricated_references.extend(
            claim.cited.iter().filter(|&&i| i == 0 || i > evidence.len()).map(|i| format!("[{i}]")),
        );

        debug!(claim = %claim.text, supporting = supporting.len(), "claim linked");
        Some(ClaimLink { claim: claim.text, supporting, unsupported_numbers, fabricated_references })
    }
}

fn reference_exists(kind: &str, id: &str, evidence: &[Prepared]) -> bool {
    let needle = normalize(&format!("{kind} {id}"));
    if evidence.iter().any(|e| e.normalized.contains(&needle)) {
        return true;
    }
    kind == "page" && id.parse::<u32>().is_ok_and(|p| evidence.iter().any(|e| e.page == Some(p)))
}
