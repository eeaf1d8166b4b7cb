//! groundrag-pipeline
//!
//! `answer_query`: injection resolution, parallel hybrid retrieval, the
//! confidence gate, bounded generation with a secondary fallback, and the
//! citation audit, always ending in an `Answer`, `Abstention` or `Refusal`.

pub mod generation;
pub mod openai;
pub mod pipeline;
pub mod prompt;

pub use generation::GenerationChain;
pub use openai::{OpenAiGenerator, OpenAiSettings};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use prompt::build_prompt;
