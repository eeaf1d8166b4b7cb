//! groundrag-core
//!
//! Data model, collaborator traits, error taxonomy and configuration shared by
//! every stage of the grounded answering pipeline.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use corpus::Corpus;
pub use error::{Error, Result};
