//! # Quarry
//!
//! Hybrid knowledge retrieval and multi-hop reasoning over
//! document-derived graphs.
//!
//! Quarry answers domain questions by retrieving grounded evidence from a
//! knowledge base before any text is generated. An offline pipeline
//! extracts entities and relations from content chunks into a property
//! graph plus paired vector indexes; at query time, retrieval strategies
//! turn a question into ranked, provenance-tagged evidence — either by
//! assembling entity/relation context around keyword matches, or by
//! executing a logic-form plan step by step against the graph.
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! // shared resources: model, embedder, graph
//! let llm = Arc::new(MockModel::new());
//! let embedder = Arc::new(HashEmbedder::default_dimension());
//! let graph = Arc::new(MemoryGraph::new());
//! let resource = RetrieveResource::new(llm.clone(), embedder.clone(), graph.clone());
//!
//! // offline: extract chunks into the graph and indexes
//! let pipeline = ExtractionPipeline::new(llm, graph);
//! let mut indexes = KnowledgeIndexes::default();
//! let chunk_store = ChunkStore::in_memory()?;
//! let chunks = vec![Chunk::new("Aspirin treats fever.")];
//! pipeline.process_batch(&chunks, &mut indexes, &chunk_store).await?;
//! indexes.build(embedder.as_ref())?;
//!
//! // online: retrieve evidence for a question
//! let retriever = KnowledgeRetriever::with_components(resource, indexes, chunk_store);
//! let evidence = retriever.explore(&Query::new("what treats fever?")).await?;
//! println!("{}", evidence.render("what treats fever?", Language::En));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`quarry_core`] — chunks, the property graph, token budgets
//! - [`quarry_embed`] — embedding and reranking seams
//! - [`quarry_index`] — ANN vector index and the chunk store
//! - [`quarry_llm`] — model interface: cache, limiters, retry, backends
//! - [`quarry_extract`] — extraction pipeline building graph + indexes
//! - [`quarry_retrieve`] — evidence, fusion, knowledge context, reasoning

pub use quarry_core as core;
pub use quarry_embed as embed;
pub use quarry_extract as extract;
pub use quarry_index as index;
pub use quarry_llm as llm;
pub use quarry_retrieve as retrieve;

/// Convenient imports for the common workflow.
pub mod prelude {
    pub use quarry_core::{
        Chunk, Direction, Edge, GraphStore, Language, MemoryGraph, Query, Subgraph, Vertex,
    };
    pub use quarry_embed::{EmbedReranker, Embedder, HashEmbedder, Reranker};
    pub use quarry_extract::{ExtractionPipeline, ExtractorConfig, KnowledgeIndexes};
    pub use quarry_index::{ChunkStore, DistanceStrategy, VectorIndex};
    pub use quarry_llm::{
        ChatCache, ChatRequest, ClientConfig, LanguageModel, LmClient, MockModel,
    };
    pub use quarry_retrieve::{
        fuse, Evidence, KnowledgeRetriever, ReasonRetriever, RetrieveResource, RetrieveStrategy,
        Retriever, RetrieverPool,
    };
}
