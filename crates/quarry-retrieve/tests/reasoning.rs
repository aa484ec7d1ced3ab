//! End-to-end reasoning over a small graph with a canned model.

use quarry_core::{Chunk, Edge, GraphStore, MemoryGraph, Query, Vertex};
use quarry_embed::{EmbedResult, HashEmbedder, Reranker};
use quarry_extract::KnowledgeIndexes;
use quarry_index::ChunkStore;
use quarry_llm::MockModel;
use quarry_retrieve::{ReasonRetriever, RetrieveError, RetrieveResource, Retriever};
use std::sync::Arc;

const SOURCE_HASH: &str = "h1";

/// Stands in for a cross-encoder: every candidate clears the floor.
struct ConstantReranker;

impl Reranker for ConstantReranker {
    fn score(&self, _query: &str, _candidate: &str) -> EmbedResult<f32> {
        Ok(1.0)
    }
}

async fn graph_fixture() -> Arc<MemoryGraph> {
    let graph = Arc::new(MemoryGraph::new());
    graph
        .upsert(
            vec![
                Vertex::new("ASPIRIN")
                    .with_type("disease")
                    .with_description("Aspirin, a common medication.")
                    .with_source(SOURCE_HASH),
                Vertex::new("FEVER")
                    .with_type("treatment")
                    .with_description("Fever, elevated body temperature.")
                    .with_source(SOURCE_HASH),
            ],
            vec![Edge::new("ASPIRIN", "FEVER")
                .with_keywords("treats")
                .with_description("Aspirin treats fever.")
                .with_source(SOURCE_HASH)],
        )
        .await
        .unwrap();
    graph
}

fn indexes_fixture(embedder: &HashEmbedder) -> KnowledgeIndexes {
    let mut indexes = KnowledgeIndexes::default();
    indexes.entity.upsert(
        Chunk::new("ASPIRIN")
            .with_metadata("entity_name", "ASPIRIN")
            .with_metadata("entity_type", "disease"),
    );
    indexes.entity.upsert(
        Chunk::new("FEVER")
            .with_metadata("entity_name", "FEVER")
            .with_metadata("entity_type", "treatment"),
    );
    indexes.relation.upsert(
        Chunk::new("treats")
            .with_metadata("src_id", "ASPIRIN")
            .with_metadata("tgt_id", "FEVER"),
    );
    indexes.build(embedder).unwrap();
    indexes
}

fn chunk_store_fixture() -> ChunkStore {
    let store = ChunkStore::in_memory().unwrap();
    let chunk = Chunk {
        hash: SOURCE_HASH.to_string(),
        content: "Aspirin treats fever effectively in adults.".to_string(),
        metadata: Default::default(),
        modality: Default::default(),
    };
    store.add(&[chunk]).unwrap();
    store
}

fn retriever_with_plan(plan_json: &str, graph: Arc<MemoryGraph>) -> ReasonRetriever {
    let llm = Arc::new(
        MockModel::new()
            .with_response("functionName", plan_json)
            .with_response("Sub-question", "Aspirin treats fever."),
    );
    let embedder = Arc::new(HashEmbedder::default_dimension());
    let indexes = indexes_fixture(embedder.as_ref());
    let resource = RetrieveResource::new(llm, embedder, graph)
        .with_reranker(Arc::new(ConstantReranker));
    ReasonRetriever::with_components(resource, indexes, chunk_store_fixture())
}

#[tokio::test]
async fn triple_query_surfaces_source_chunk() {
    let graph = graph_fixture().await;
    let plan = r#"[
      {"step": "Query what relates aspirin and fever", "action": "get_spo(s=s1:disease[Aspirin], p=p1:relation, o=o1:treatment[Fever])"},
      {"step": "Return the relation", "action": "get(p1)"}
    ]"#;
    let retriever = retriever_with_plan(plan, graph);

    let evidence = retriever
        .explore(&Query::new("what relates aspirin and fever"))
        .await
        .unwrap();

    // provenance: the edge's source chunk surfaces in the evidence
    assert!(evidence
        .source_chunks
        .iter()
        .any(|c| c.hash == SOURCE_HASH));
    // the sub-answer log records both steps' trace
    assert!(!evidence.sub_qa.is_empty());
    assert!(evidence.sub_qa[0].sub_answer.contains("treats"));
}

#[tokio::test]
async fn one_hop_query_binds_unknown_endpoint() {
    let graph = graph_fixture().await;
    let plan = r#"[
      {"step": "What does aspirin treat?", "action": "get_spo(s=s1:disease[Aspirin], p=p1:treats, o=o1)"},
      {"step": "Return the target", "action": "get(o1)"}
    ]"#;
    let retriever = retriever_with_plan(plan, graph);

    let evidence = retriever
        .explore(&Query::new("what does aspirin treat"))
        .await
        .unwrap();
    assert!(evidence
        .source_chunks
        .iter()
        .any(|c| c.hash == SOURCE_HASH));
}

#[tokio::test]
async fn unresolved_entity_fails_fast() {
    let graph = graph_fixture().await;
    let plan = r#"[
      {"step": "Query something unknown", "action": "get_spo(s=s1:thing[Moonbase], p=p1:relation, o=o1:thing[Station])"}
    ]"#;
    let llm = Arc::new(MockModel::new().with_response("functionName", plan));
    let embedder = Arc::new(HashEmbedder::default_dimension());
    let resource = RetrieveResource::new(llm, embedder, graph);
    // nothing indexed: no mention can clear the similarity floor
    let retriever = ReasonRetriever::with_components(
        resource,
        KnowledgeIndexes::default(),
        chunk_store_fixture(),
    );

    let err = retriever
        .explore(&Query::new("unknown things"))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrieveError::ResolutionFailed { .. }));
}

#[tokio::test]
async fn arithmetic_is_delegated_to_the_model() {
    let graph = graph_fixture().await;
    let llm = Arc::new(
        MockModel::new()
            .with_response(
                "functionName",
                r#"[
                  {"step": "Add 30 and 6", "action": "sum(30, 6)->sum1"},
                  {"step": "Return the sum", "action": "get(sum1)"}
                ]"#,
            )
            .with_response("math expert", "36"),
    );
    let embedder = Arc::new(HashEmbedder::default_dimension());
    let indexes = indexes_fixture(embedder.as_ref());
    let resource = RetrieveResource::new(llm, embedder, graph);
    let retriever =
        ReasonRetriever::with_components(resource, indexes, chunk_store_fixture());

    let evidence = retriever.explore(&Query::new("what is 30+6")).await.unwrap();
    // arithmetic produces a logged answer but no chunk provenance
    assert!(evidence.source_chunks.is_empty());
    assert_eq!(evidence.sub_qa[0].sub_answer, "36");
}

#[tokio::test]
async fn malformed_plan_aborts_the_attempt() {
    let graph = graph_fixture().await;
    let retriever = retriever_with_plan("I cannot find a suitable function", graph);

    let err = retriever
        .explore(&Query::new("anything"))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrieveError::PlanParse(_)));
}
