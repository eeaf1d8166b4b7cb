use tracing::info;

use groundrag_core::config::GateConfig;
use groundrag_core::types::{EvidenceSet, Snippet};

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Proceed { confidence: f32 },
    Fallback { confidence: f32, snippets: Vec<Snippet> },
}

impl GateDecision {
    pub fn is_proceed(&self) -> bool { matches!(self, GateDecision::Proceed { .. }) }

    pub fn confidence(&self) -> f32 {
        match self {
            GateDecision::Proceed { confidence } | GateDecision::Fallback { confidence, .. } => *confidence,
        }
    }
}

/// Deterministic pre-generation checkpoint.
///
/// Confidence is the mean `normalized_score` of the evidence set. Below the
/// threshold, or with no evidence at all, the top snippets are returned
/// verbatim and generation must not be called.
#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    threshold: f32,
    fallback_snippets: usize,
}

impl ConfidenceGate {
    pub fn new(threshold: f32, fallback_snippets: usize) -> Self {
        Self { threshold, fallback_snippets: fallback_snippets.clamp(1, 3) }
    }

    pub fn from_config(cfg: &GateConfig) -> Self { Self::new(cfg.threshold, cfg.fallback_snippets) }

    pub fn threshold(&self) -> f32 { self.threshold }

    /// The extractive fallback for `evidence`: its first 1-3 snippets.
    pub fn fallback_snippets(&self, evidence: &EvidenceSet) -> Vec<Snippet> { evidence.snippets(self.fallback_snippets) }

    pub fn gate(&self, evidence: &EvidenceSet) -> GateDecision {
        let confidence = evidence.mean_confidence();
        let proceed = !evidence.is_empty() && confidence >= self.threshold;
        info!(confidence, threshold = self.threshold, evidence = evidence.len(), proceed, "confidence gate");
        if proceed {
            GateDecision::Proceed { confidence }
        } else {
            GateDecision::Fallback { confidence, snippets: self.fallback_snippets(evidence) }
        }
    }
}
