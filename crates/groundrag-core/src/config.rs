//! Configuration loader, the typed pipeline surface, and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! The `pipeline` section is extracted into [`PipelineConfig`]; every field has
//! a default so an absent section yields the documented defaults.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.pipeline()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn contains(&self, key: &str) -> bool { self.figment.contains(key) }

    /// Like [`Config::get`], but an absent section yields `T::default()`.
    /// A section that is present and malformed is still an error.
    pub fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.contains(key) { self.get(key) } else { Ok(T::default()) }
    }

    /// The validated `pipeline` section, or defaults when it is absent.
    pub fn pipeline(&self) -> Result<PipelineConfig> {
        let cfg = if self.figment.contains("pipeline") {
            self.figment
                .extract_inner::<PipelineConfig>("pipeline")
                .map_err(|e| Error::InvalidConfig(e.to_string()))?
        } else {
            PipelineConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Hits requested from each index.
    pub top_k: usize,
    /// Maximum evidence set size after diversification.
    pub top_n: usize,
    pub mmr_lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self { Self { top_k: 20, top_n: 5, mmr_lambda: 0.7 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub threshold: f32,
    pub fallback_snippets: usize,
}

impl Default for GateConfig {
    fn default() -> Self { Self { threshold: 0.60, fallback_snippets: 3 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub strict: bool,
    /// Share of a claim's content tokens that must occur in one snippet.
    pub min_token_coverage: f32,
}

impl Default for AuditConfig {
    fn default() -> Self { Self { strict: true, min_token_coverage: 0.6 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub timeout_ms: u64,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

impl Default for GenerationConfig {
    fn default() -> Self { Self { timeout_ms: 20_000 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub max_query_chars: usize,
}

impl Default for GuardConfig {
    fn default() -> Self { Self { max_query_chars: 2_000 } }
}

/// Everything the core reads at construction time. Immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bm25: Bm25Params,
    pub retrieval: RetrievalConfig,
    pub gate: GateConfig,
    pub audit: AuditConfig,
    pub generation: GenerationConfig,
    pub guard: GuardConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        fn unit<T: Into<f64> + Copy>(name: &str, v: T) -> Result<()> {
            let v: f64 = v.into();
            if (0.0..=1.0).contains(&v) { Ok(()) } else { Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {v}"))) }
        }
        if !(self.bm25.k1.is_finite() && self.bm25.k1 > 0.0) {
            return Err(Error::InvalidConfig(format!("bm25.k1 must be positive, got {}", self.bm25.k1)));
        }
        unit("bm25.b", self.bm25.b)?;
        unit("gate.threshold", self.gate.threshold)?;
        unit("retrieval.mmr_lambda", self.retrieval.mmr_lambda)?;
        unit("audit.min_token_coverage", self.audit.min_token_coverage)?;
        if self.retrieval.top_k == 0 || self.retrieval.top_n == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k and retrieval.top_n must be at least 1".into()));
        }
        if self.generation.timeout_ms == 0 {
            return Err(Error::InvalidConfig("generation.timeout_ms must be positive".into()));
        }
        if self.guard.max_query_chars == 0 {
            return Err(Error::InvalidConfig("guard.max_query_chars must be positive".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
