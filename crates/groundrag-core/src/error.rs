use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Snapshot cache corrupt: {0}")]
    CacheCorrupt(String),

    #[error("Corpus invalid: {0}")]
    CorpusInvalid(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Risk classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Invalid input: {0}")]
    InputInvalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
