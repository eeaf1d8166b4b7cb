use std::sync::Arc;

use tracing::{info, warn};

use groundrag_audit::CitationAuditor;
use groundrag_core::config::PipelineConfig;
use groundrag_core::error::{Error, Result};
use groundrag_core::traits::{Embedder, GenerationRequest, Generator, Reranker, RiskClassifier, SnapshotStore, VectorIndexClient};
use groundrag_core::types::{AbstentionReason, AuditVerdict, Citation, EvidenceSet, Response};
use groundrag_core::Corpus;
use groundrag_guard::{Decision, InjectionResolver};
use groundrag_hybrid::{fuse, rerank, select_mmr, ConfidenceGate, GateDecision, TokenJaccard};
use groundrag_lexical::{CacheStatus, LexicalIndex};
use groundrag_vector::VectorIndexAdapter;

use crate::generation::GenerationChain;
use crate::prompt::build_prompt;

/// The owned, reconstructible question-answering core.
///
/// Configuration is fixed at construction. The corpus and its lexical snapshot
/// can be swapped with [`Pipeline::rebuild_lexical`] while queries are in flight.
pub struct Pipeline {
    config: PipelineConfig,
    lexical: Arc<LexicalIndex>,
    vector: VectorIndexAdapter,
    embedder: Arc<dyn Embedder>,
    resolver: InjectionResolver,
    reranker: Option<Arc<dyn Reranker>>,
    similarity: TokenJaccard,
    gate: ConfidenceGate,
    auditor: CitationAuditor,
    generation: GenerationChain,
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    corpus: Corpus,
    embedder: Option<Arc<dyn Embedder>>,
    vector_index: Option<Arc<dyn VectorIndexClient>>,
    classifier: Option<Arc<dyn RiskClassifier>>,
    generator: Option<Arc<dyn Generator>>,
    secondary_generator: Option<Arc<dyn Generator>>,
    reranker: Option<Arc<dyn Reranker>>,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
}

impl PipelineBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self { self.embedder = Some(embedder); self }

    pub fn vector_index(mut self, client: Arc<dyn VectorIndexClient>) -> Self { self.vector_index = Some(client); self }

    pub fn classifier(mut self, classifier: Arc<dyn RiskClassifier>) -> Self { self.classifier = Some(classifier); self }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self { self.generator = Some(generator); self }

    pub fn secondary_generator(mut self, generator: Arc<dyn Generator>) -> Self { self.secondary_generator = Some(generator); self }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self { self.reranker = Some(reranker); self }

    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self { self.snapshot_store = Some(store); self }

    /// Validate configuration, then load or rebuild the lexical snapshot.
    pub fn build(self) -> Result<Pipeline> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T> {
            value.ok_or_else(|| Error::InvalidConfig(format!("pipeline requires a {name}")))
        }
        self.config.validate()?;
        let embedder = required(self.embedder, "embedder")?;
        let vector_index = required(self.vector_index, "vector index client")?;
        let classifier = required(self.classifier, "risk classifier")?;
        let generator = required(self.generator, "generator")?;
        let store = required(self.snapshot_store, "snapshot store")?;

        let lexical = Arc::new(LexicalIndex::open(self.corpus, self.config.bm25, store));
        let pipeline = Pipeline {
            resolver: InjectionResolver::new(classifier, &self.config.guard),
            similarity: TokenJaccard::new(lexical.analyzer().clone()),
            gate: ConfidenceGate::from_config(&self.config.gate),
            auditor: CitationAuditor::from_config(&self.config.audit),
            generation: GenerationChain::new(generator, self.secondary_generator),
            vector: VectorIndexAdapter::new(vector_index),
            reranker: self.reranker,
            embedder,
            lexical,
            config: self.config,
        };
        info!(
            chunks = pipeline.corpus().len(),
            lexical = ?pipeline.lexical.cache_status(),
            strict = pipeline.config.audit.strict,
            "pipeline constructed"
        );
        Ok(pipeline)
    }
}

impl Pipeline {
    pub fn builder(config: PipelineConfig, corpus: Corpus) -> PipelineBuilder {
        PipelineBuilder {
            config,
            corpus,
            embedder: None,
            vector_index: None,
            classifier: None,
            generator: None,
            secondary_generator: None,
            reranker: None,
            snapshot_store: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }

    pub fn corpus(&self) -> Arc<Corpus> { self.lexical.corpus() }

    /// Revalidate the lexical snapshot against `corpus` and make both current.
    /// In-flight queries finish on the corpus and snapshot they started with.
    pub fn rebuild_lexical(&self, corpus: Corpus) -> Option<CacheStatus> {
        let status = self.lexical.rebuild(corpus);
        info!(status = ?status, "lexical index rebuilt");
        status
    }

    /// Resolve, retrieve, gate, generate and audit one query.
    pub async fn answer_query(&self, raw: &str) -> Response {
        let resolution = self.resolver.resolve(raw).await;
        let query = match resolution.decision {
            Decision::Refuse(reason) => {
                info!(response = "refusal", "query refused");
                return Response::Refusal { reason, original_text: raw.to_string() };
            }
            Decision::Answer { effective_query, .. } => effective_query,
        };

        let evidence = self.retrieve(&query).await;
        if evidence.is_empty() {
            info!(response = "abstention", "no evidence retrieved");
            return Response::Abstention { extractive_snippets: Vec::new(), reason: AbstentionReason::NoEvidence };
        }

        let confidence = match self.gate.gate(&evidence) {
            GateDecision::Proceed { confidence } => confidence,
            GateDecision::Fallback { confidence, snippets } => {
                return Response::Abstention {
                    extractive_snippets: snippets,
                    reason: AbstentionReason::LowConfidence { confidence, threshold: self.gate.threshold() },
                };
            }
        };

        let request = GenerationRequest {
            prompt: build_prompt(&query, &evidence),
            context: evidence.snippets(evidence.len()),
            timeout: self.config.generation.timeout(),
        };
        let text = match self.generation.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                return Response::Abstention {
                    extractive_snippets: self.gate.fallback_snippets(&evidence),
                    reason: AbstentionReason::GenerationUnavailable { detail: e.to_string() },
                };
            }
        };

        let verdict = self.auditor.audit(&text, &evidence);
        if self.config.audit.strict && !verdict.is_fully_cited() {
            warn!(audit_status = %verdict.status, "generated answer failed strict citation audit; falling back");
            return Response::Abstention {
                extractive_snippets: self.gate.fallback_snippets(&evidence),
                reason: AbstentionReason::CitationAudit { verdict },
            };
        }
        let citations = citations_for(&verdict, &evidence);
        info!(response = "answer", citations = citations.len(), confidence, "query answered");
        Response::Answer { text, citations, audit: verdict, confidence }
    }

    /// Lexical and vector retrieval in parallel, then fuse, rerank and diversify.
    pub async fn retrieve(&self, query: &str) -> EvidenceSet {
        // one view for the whole query: hit ids resolve against the corpus they were scored on
        let view = self.lexical.view();
        let k = self.config.retrieval.top_k;

        let lexical = {
            let index = Arc::clone(&self.lexical);
            let view = view.clone();
            let query = query.to_string();
            tokio::task::spawn_blocking(move || index.search_view(&view, &query, k))
        };
        let vector = async {
            match self.embedder.embed(query) {
                Ok(embedding) => self.vector.query(&embedding, k).await,
                Err(e) => {
                    warn!(error = %e, "query embedding failed; retrieval degrades to lexical-only");
                    Vec::new()
                }
            }
        };
        let (lexical, vector) = tokio::join!(lexical, vector);
        let lexical = lexical.unwrap_or_else(|e| {
            warn!(error = %e, "lexical search task failed");
            Vec::new()
        });

        let fused = fuse(view.corpus(), &lexical, &vector);
        let ranked = rerank(self.reranker.as_deref(), query, fused).await;
        let evidence = select_mmr(ranked, self.config.retrieval.top_n, self.config.retrieval.mmr_lambda, &self.similarity);
        info!(lexical = lexical.len(), vector = vector.len(), evidence = evidence.len(), "retrieval complete");
        evidence
    }
}

/// Evidence chunks linked by at least one claim, in evidence order.
fn citations_for(verdict: &AuditVerdict, evidence: &EvidenceSet) -> Vec<Citation> {
    evidence
        .iter()
        .enumerate()
        .filter(|(_, c)| verdict.claims.iter().any(|claim| claim.supporting.contains(&c.chunk.id)))
        .map(|(i, c)| Citation { index: i + 1, chunk_id: c.chunk.id, source: c.chunk.source.clone(), page: c.chunk.page })
        .collect()
}
