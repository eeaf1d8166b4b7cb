use std::fs;
use std::sync::Arc;

use figment::{providers::{Format, Toml}, Figment, Jail};
use tempfile::TempDir;

use groundrag_core::config::{Config, PipelineConfig};
use groundrag_core::types::{Candidate, DocumentChunk, EvidenceSet, Origin, Response, RiskTier};
use groundrag_core::{Corpus, Error};

fn candidate(id: u64, score: f32) -> Candidate {
    Candidate {
        chunk: Arc::new(DocumentChunk::new(id, "manual.pdf", Some(1), format!("chunk {id}"))),
        origin: Origin::Lexical,
        raw_score: score,
        normalized_score: score,
        rerank_score: None,
    }
}

#[test]
fn load_txt_dir_splits_pages_and_paragraphs() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "Oil capacity is 4.5 quarts.\n\nUse 5W-30.\x0cTire pressure is 35 psi.").unwrap();
    fs::write(dir.join("b.txt"), "Short text").unwrap();

    let corpus = Corpus::load(dir).expect("load");
    assert_eq!(corpus.len(), 4);
    let first = corpus.get(0).unwrap();
    assert_eq!(first.source, "a.txt");
    assert_eq!(first.page, Some(1));
    assert_eq!(corpus.get(2).unwrap().page, Some(2));
    assert_eq!(corpus.get(3).unwrap().page, None, "unpaginated files carry no page");
    assert_eq!(first.token_count, 5);
}

#[test]
fn load_jsonl_fills_token_count_and_rejects_duplicates() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("corpus.jsonl");
    fs::write(&path, "{\"id\":7,\"text\":\"check the oil\",\"source\":\"m\"}\n\n{\"id\":8,\"text\":\"x\",\"source\":\"m\",\"page\":3}\n").unwrap();
    let corpus = Corpus::load(&path).expect("load");
    assert_eq!(corpus.get(7).unwrap().token_count, 3);
    assert_eq!(corpus.get(8).unwrap().page, Some(3));

    fs::write(&path, "{\"id\":1,\"text\":\"a\",\"source\":\"m\"}\n{\"id\":1,\"text\":\"b\",\"source\":\"m\"}\n").unwrap();
    assert!(matches!(Corpus::load(&path), Err(Error::CorpusInvalid(_))));
}

#[test]
fn missing_corpus_is_not_found() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(Corpus::load(&tmp.path().join("nope.jsonl")), Err(Error::NotFound(_))));
}

#[test]
fn evidence_mean_confidence() {
    assert_eq!(EvidenceSet::empty().mean_confidence(), 0.0);
    let set = EvidenceSet::new(vec![candidate(1, 0.9), candidate(2, 0.5)]);
    assert!((set.mean_confidence() - 0.7).abs() < 1e-6);
    assert_eq!(set.snippets(1).len(), 1);
    assert_eq!(set.snippets(5).len(), 2);
}

#[test]
fn origin_merge_and_tier_safety() {
    assert_eq!(Origin::Lexical.merge(Origin::Vector), Origin::Both);
    assert_eq!(Origin::Vector.merge(Origin::Vector), Origin::Vector);
    assert!(RiskTier::Medium.is_safe());
    assert!(!RiskTier::High.is_safe());
    assert!(RiskTier::Critical > RiskTier::Low);
}

#[test]
fn response_serializes_with_tags() {
    let r = Response::Refusal {
        reason: groundrag_core::types::RefusalReason::EmptyAfterStripping,
        original_text: "SYSTEM:".into(),
    };
    let v = serde_json::to_value(&r).unwrap();
    assert_eq!(v["type"], "refusal");
    assert_eq!(v["reason"]["kind"], "empty_after_stripping");
}

#[test]
fn pipeline_defaults_when_section_absent() {
    let config = Config::from_figment(Figment::new());
    let p = config.pipeline().expect("defaults");
    assert_eq!(p, PipelineConfig::default());
    assert_eq!(p.bm25.k1, 1.5);
    assert_eq!(p.gate.threshold, 0.60);
}

#[test]
fn pipeline_section_overrides_and_validates() {
    let figment = Figment::new().merge(Toml::string("[pipeline.gate]\nthreshold = 0.75\n[pipeline.bm25]\nk1 = 1.2"));
    let p = Config::from_figment(figment).pipeline().expect("valid");
    assert_eq!(p.gate.threshold, 0.75);
    assert_eq!(p.bm25.k1, 1.2);
    assert_eq!(p.bm25.b, 0.75, "unset fields keep defaults");

    let bad = Figment::new().merge(Toml::string("[pipeline.retrieval]\nmmr_lambda = 1.5"));
    assert!(matches!(Config::from_figment(bad).pipeline(), Err(Error::InvalidConfig(_))));
}

#[test]
fn load_merges_env_overrides() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[pipeline.audit]\nstrict = true\n[data]\ncorpus = \"corpus.jsonl\"")?;
        jail.set_env("RUST_ENV", "test");
        jail.set_env("APP_PIPELINE__AUDIT__STRICT", "false");
        let config = Config::load().map_err(|e| e.to_string())?;
        let p = config.pipeline().map_err(|e| e.to_string())?;
        assert!(!p.audit.strict);
        let corpus: String = config.get("data.corpus").map_err(|e| e.to_string())?;
        assert_eq!(corpus, "corpus.jsonl");
        Ok(())
    });
}

#[derive(Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
struct DataSection {
    corpus_path: String,
    batch_size: usize,
}

#[test]
fn absent_section_defaults_but_malformed_section_errors() {
    let config = Config::from_figment(Figment::new());
    assert_eq!(config.get_or_default::<DataSection>("data").unwrap(), DataSection::default());
    assert!(!config.contains("data"));

    let good = Config::from_figment(Figment::new().merge(Toml::string("[data]\ncorpus_path = \"manuals\"")));
    assert_eq!(good.get_or_default::<DataSection>("data").unwrap().corpus_path, "manuals");

    let bad = Config::from_figment(Figment::new().merge(Toml::string("[data]\nbatch_size = \"lots\"")));
    assert!(bad.contains("data"));
    assert!(bad.get_or_default::<DataSection>("data").is_err());
}
