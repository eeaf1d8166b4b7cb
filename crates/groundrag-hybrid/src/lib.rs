//! groundrag-hybrid
//!
//! Candidate fusion across lexical and vector hits, optional rerank
//! delegation, MMR diversification into an evidence set, and the confidence
//! gate that decides whether generation may run at all.

pub mod fusion;
pub mod gate;
pub mod mmr;
pub mod rerank;

pub use fusion::fuse;
pub use gate::{ConfidenceGate, GateDecision};
pub use mmr::{select_mmr, Similarity, TokenJaccard};
pub use rerank::rerank;
