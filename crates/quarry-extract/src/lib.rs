//! Offline extraction pipeline: prompts a language model to emit
//! delimiter-separated entity/relation records per chunk, merges
//! duplicates, and writes the result into the graph store and four vector
//! indexes (precise-name and semantic-mix variants for both entities and
//! relations).

mod indexes;
mod merge;
mod pipeline;
pub mod prompts;
pub mod records;

pub use indexes::KnowledgeIndexes;
pub use merge::{merge_entity, merge_relation};
pub use pipeline::{BatchReport, ExtractionPipeline, ExtractorConfig};
pub use records::{RawEntity, RawRelation, ENTITY_MAX_LENGTH};

/// Errors from the extraction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("model error: {0}")]
    Llm(#[from] quarry_llm::LlmError),

    #[error("graph error: {0}")]
    Graph(#[from] quarry_core::GraphError),

    #[error("index error: {0}")]
    Index(#[from] quarry_index::IndexError),
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;
