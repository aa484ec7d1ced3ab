//! Retrieval framework: every strategy turns a query into ranked,
//! provenance-tagged [`Evidence`] through the same `explore` contract.
//!
//! Two strategies ship here. The knowledge retriever assembles
//! entity-centric ("local") and relation-centric ("global") context around
//! keyword matches; the reasoning engine parses a question into a
//! logic-form plan and executes it step by step against the graph. A
//! failed reasoning attempt is a typed error, so callers degrade to a
//! simpler strategy instead of crashing.

mod evidence;
mod fuse;
mod knowledge;
pub mod logic;
mod pool;
pub mod prompts;
mod reason;
mod resource;
mod retriever;

pub use evidence::{Evidence, SubQa};
pub use fuse::fuse;
pub use knowledge::KnowledgeRetriever;
pub use pool::{RetrieveStrategy, RetrieverPool};
pub use reason::ReasonRetriever;
pub use resource::RetrieveResource;
pub use retriever::Retriever;

/// Errors from retrieval and reasoning.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("model error: {0}")]
    Llm(#[from] quarry_llm::LlmError),

    #[error("graph error: {0}")]
    Graph(#[from] quarry_core::GraphError),

    #[error("index error: {0}")]
    Index(#[from] quarry_index::IndexError),

    #[error("embedding error: {0}")]
    Embed(#[from] quarry_embed::EmbedError),

    #[error("store error: {0}")]
    Store(#[from] quarry_extract::ExtractError),

    /// Nothing in the index cleared the similarity floor for this name.
    /// Fatal to the current reasoning step; callers catch it and fall
    /// back to a simpler retrieval strategy.
    #[error("could not resolve {kind} '{name}' above the similarity floor")]
    ResolutionFailed { kind: &'static str, name: String },

    #[error("could not parse logic-form plan: {0}")]
    PlanParse(String),
}

/// Result type for retrieval operations.
pub type RetrieveResult<T> = Result<T, RetrieveError>;
