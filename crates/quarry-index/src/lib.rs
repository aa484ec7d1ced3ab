//! Approximate nearest-neighbor search over chunks, plus the
//! content-addressed chunk store.
//!
//! [`VectorIndex`] pairs a navigable-graph ANN structure with the parallel
//! chunk list it indexes; [`ChunkStore`] is the sqlite table every graph
//! `source_id` resolves through.

mod ann;
mod chunk_store;
mod index;
mod strategy;

pub use ann::{AnnParams, NavigableGraph};
pub use chunk_store::ChunkStore;
pub use index::VectorIndex;
pub use strategy::DistanceStrategy;

/// Errors from index and chunk-store operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embed(#[from] quarry_embed::EmbedError),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
