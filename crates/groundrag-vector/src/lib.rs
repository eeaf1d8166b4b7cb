//! groundrag-vector
//!
//! Vector side of hybrid retrieval: the failure-absorbing adapter that maps
//! external ANN distances onto the shared confidence scale, an in-memory flat
//! index, a deterministic hashing embedder, and (feature `lancedb`) a LanceDB
//! client.

pub mod adapter;
pub mod embed;
pub mod flat;
#[cfg(feature = "lancedb")]
pub mod lance;

pub use adapter::{normalize_distance, VectorHit, VectorIndexAdapter};
pub use embed::HashingEmbedder;
pub use flat::FlatIndex;
#[cfg(feature = "lancedb")]
pub use lance::LanceVectorClient;
