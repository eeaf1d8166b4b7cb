use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use groundrag_core::config::{expand_path, Config, PipelineConfig};
use groundrag_core::traits::{Embedder, SnapshotStore, VectorIndexClient};
use groundrag_core::types::{AbstentionReason, RefusalReason, Response, Snippet};
use groundrag_core::Corpus;
use groundrag_guard::LexiconClassifier;
use groundrag_lexical::cache::check_cached;
use groundrag_lexical::{corpus_hash, FsSnapshotStore, LexicalIndex};
use groundrag_pipeline::{OpenAiGenerator, OpenAiSettings, Pipeline};
use groundrag_vector::{FlatIndex, HashingEmbedder};

#[derive(Parser)]
#[command(name = "groundrag", version, about = "Evidence-gated answers from maintenance manuals")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question, abstain, or refuse
    Ask {
        query: String,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the corpus and validate or rebuild the lexical snapshot
    Index,
    /// Show resolved configuration and snapshot validity
    Status,
}

/// The `data` config section.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct DataPaths {
    corpus_path: String,
    snapshot_dir: String,
}

impl Default for DataPaths {
    fn default() -> Self { Self { corpus_path: "../dev_data/corpus".into(), snapshot_dir: "../dev_data/indexes/bm25".into() } }
}

/// The `vector` config section.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct VectorSettings {
    backend: String,
    embedding_dim: usize,
    batch_size: usize,
    lancedb_path: String,
    table: String,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: "flat".into(),
            embedding_dim: groundrag_vector::embed::DEFAULT_DIM,
            batch_size: 64,
            lancedb_path: "../dev_data/indexes/lancedb".into(),
            table: "documents".into(),
        }
    }
}

struct Workspace {
    pipeline_config: PipelineConfig,
    data: DataPaths,
    vector: VectorSettings,
    corpus: Corpus,
    store: Arc<FsSnapshotStore>,
}

fn load_workspace(config: &Config) -> anyhow::Result<Workspace> {
    let pipeline_config = config.pipeline()?;
    let data: DataPaths = config.get_or_default("data")?;
    let vector: VectorSettings = config.get_or_default("vector")?;
    let corpus = Corpus::load(&expand_path(&data.corpus_path))?;
    info!(path = %data.corpus_path, chunks = corpus.len(), "corpus loaded");
    let store = Arc::new(FsSnapshotStore::new(expand_path(&data.snapshot_dir)));
    Ok(Workspace { pipeline_config, data, vector, corpus, store })
}

fn build_flat_index(corpus: &Corpus, embedder: &dyn Embedder, batch_size: usize) -> anyhow::Result<FlatIndex> {
    let pb = ProgressBar::new(corpus.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} embedding [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")?
            .progress_chars("#>-"),
    );
    let index = FlatIndex::build_with_progress(corpus, embedder, batch_size, |n| pb.inc(n as u64))?;
    pb.finish_and_clear();
    Ok(index)
}

async fn vector_client(ws: &Workspace, embedder: &dyn Embedder) -> anyhow::Result<Arc<dyn VectorIndexClient>> {
    debug!(backend = %ws.vector.backend, dim = ws.vector.embedding_dim, "opening vector index");
    match ws.vector.backend.as_str() {
        "flat" => Ok(Arc::new(build_flat_index(&ws.corpus, embedder, ws.vector.batch_size)?)),
        #[cfg(feature = "lancedb")]
        "lancedb" => {
            let path = expand_path(&ws.vector.lancedb_path);
            Ok(Arc::new(groundrag_vector::LanceVectorClient::open(&path, &ws.vector.table).await?))
        }
        other => anyhow::bail!("unsupported vector backend '{other}'"),
    }
}

async fn ask(config: &Config, query: &str, json: bool) -> anyhow::Result<()> {
    let ws = load_workspace(config)?;
    let embedder = Arc::new(HashingEmbedder::new(ws.vector.embedding_dim));
    let vectors = vector_client(&ws, embedder.as_ref()).await?;

    let primary = OpenAiGenerator::new(config.get_or_default::<OpenAiSettings>("generator")?);
    let mut builder = Pipeline::builder(ws.pipeline_config, ws.corpus)
        .embedder(embedder)
        .vector_index(vectors)
        .classifier(Arc::new(LexiconClassifier))
        .generator(Arc::new(primary))
        .snapshot_store(ws.store);
    if config.contains("secondary_generator") {
        let settings = config.get::<OpenAiSettings>("secondary_generator")?;
        builder = builder.secondary_generator(Arc::new(OpenAiGenerator::new(settings)));
    }
    let pipeline = builder.build()?;

    let response = pipeline.answer_query(query).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_snippets(snippets: &[Snippet]) {
    for (i, s) in snippets.iter().enumerate() {
        let page = s.page.map(|p| format!(", page {p}")).unwrap_or_default();
        println!("\n  {}. {}{}", i + 1, s.source, page);
        println!("     {}", s.text);
    }
}

fn print_response(response: &Response) {
    match response {
        Response::Answer { text, citations, audit, confidence } => {
            println!("{text}\n");
            println!("✅ {} (confidence {:.2})", audit.status, confidence);
            for c in citations {
                let page = c.page.map(|p| format!(", page {p}")).unwrap_or_default();
                println!("  [{}] {}{}", c.index, c.source, page);
            }
        }
        Response::Abstention { extractive_snippets, reason } => {
            let why = match reason {
                AbstentionReason::NoEvidence => "no supporting passages found".to_string(),
                AbstentionReason::LowConfidence { confidence, threshold } => {
                    format!("retrieval confidence {confidence:.2} is below {threshold:.2}")
                }
                AbstentionReason::GenerationUnavailable { detail } => format!("generation unavailable: {detail}"),
                AbstentionReason::CitationAudit { verdict } => format!("generated answer was {}", verdict.status),
            };
            println!("⚠️  Not answering: {why}");
            if !extractive_snippets.is_empty() {
                println!("\nRelevant manual passages:");
                print_snippets(extractive_snippets);
            }
        }
        Response::Refusal { reason, .. } => {
            let why = match reason {
                RefusalReason::InputInvalid { detail } => detail.clone(),
                RefusalReason::EmptyAfterStripping => "nothing left to answer after removing embedded instructions".into(),
                RefusalReason::UnsafeIntent { .. } => "part of this request asks for an unsafe procedure".into(),
                RefusalReason::ClassifierUnavailable { .. } => "safety screening is unavailable".into(),
            };
            println!("⛔ Refused: {why}");
        }
    }
}

fn index(config: &Config) -> anyhow::Result<()> {
    let ws = load_workspace(config)?;
    println!("Corpus: {} ({} chunks)", ws.data.corpus_path, ws.corpus.len());
    println!("Snapshot: {}", ws.data.snapshot_dir);
    let store: Arc<dyn SnapshotStore> = ws.store;
    let index = LexicalIndex::open(ws.corpus, ws.pipeline_config.bm25, store);
    let snapshot = index.ready()?;
    let status = index.cache_status().map(|s| s.to_string()).unwrap_or_default();
    println!("✅ Lexical snapshot {status}: {} docs, {} terms", snapshot.doc_count, snapshot.postings.len());
    Ok(())
}

fn status(config: &Config) -> anyhow::Result<()> {
    let ws = load_workspace(config)?;
    println!("{}", serde_json::to_string_pretty(&ws.pipeline_config)?);
    let hash = corpus_hash(&ws.corpus);
    println!("\n📊 Corpus {} ({} chunks, hash {hash})", ws.data.corpus_path, ws.corpus.len());
    match check_cached(ws.store.as_ref(), &hash, ws.pipeline_config.bm25) {
        Ok(snapshot) => println!("✅ Lexical snapshot valid ({} docs, {} terms)", snapshot.doc_count, snapshot.postings.len()),
        Err(reason) => println!("⚠️  Lexical snapshot needs rebuild: {reason}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    match cli.command {
        Command::Ask { query, json } => ask(&config, &query, json).await,
        Command::Index => index(&config),
        Command::Status => status(&config),
    }
}
