//! Shared resources handed to every retriever at construction.

use quarry_core::GraphStore;
use quarry_embed::{EmbedReranker, Embedder, Reranker};
use quarry_llm::LanguageModel;
use std::sync::Arc;

/// The heavyweight collaborators retrievers share: one model client, one
/// embedder, one reranker, one graph store.
///
/// Passed explicitly at construction so tests can inject mocks; nothing
/// here is process-global.
#[derive(Clone)]
pub struct RetrieveResource {
    pub llm: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Arc<dyn Reranker>,
    pub graph: Arc<dyn GraphStore>,
}

impl RetrieveResource {
    /// Assemble with an embedding-backed reranker.
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        let reranker = Arc::new(EmbedReranker::new(embedder.clone()));
        Self {
            llm,
            embedder,
            reranker,
            graph,
        }
    }

    /// Swap in a different reranker backend.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }
}
