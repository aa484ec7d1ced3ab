//! The retrieval strategy contract.

use crate::{Evidence, RetrieveResult};
use async_trait::async_trait;
use quarry_core::Query;

/// A retrieval strategy: query in, evidence out.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Produce evidence for the query. May fan out to the model, the
    /// vector indexes and the graph store.
    async fn explore(&self, query: &Query) -> RetrieveResult<Evidence>;

    /// Maximum relevance of the query against this strategy's indexes.
    ///
    /// Callers compare it against a reject threshold to decide whether
    /// retrieval is worth running at all. Strategies without an index
    /// report 0.0.
    async fn similarity_score(&self, query: &Query) -> RetrieveResult<f32> {
        let _ = query;
        Ok(0.0)
    }
}
