//! Core types shared across all Quarry crates.
//!
//! A [`Chunk`] is the minimal content unit with a stable content-derived
//! hash. The property graph built from chunks is made of [`Vertex`] and
//! [`Edge`] values behind the [`GraphStore`] trait. Everything surfaced to
//! a caller ultimately traces back to chunk hashes carried in
//! `source_ids` sets.

pub mod chunk;
pub mod graph;
pub mod text;
pub mod token;

pub use chunk::{chunk_hash, Chunk, Language, Modality, Query};
pub use graph::{
    Direction, Edge, GraphError, GraphResult, GraphStore, MemoryGraph, Subgraph, Vertex,
};
pub use token::{token_len, truncate_by_token_budget};

/// Separator joining merged description fragments and source-id lists
/// inside graph properties.
pub const GRAPH_FIELD_SEP: &str = "<SEP>";
