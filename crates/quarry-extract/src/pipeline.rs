//! Batch extraction: chunks in, graph and indexes out.

use crate::merge::{merge_entity, merge_relation};
use crate::prompts;
use crate::records::{parse_extraction_output, RawEntity, RawRelation};
use crate::{ExtractResult, KnowledgeIndexes};
use futures::future::join_all;
use quarry_core::{token_len, Chunk, Edge, GraphStore, Language, Vertex, GRAPH_FIELD_SEP};
use quarry_index::ChunkStore;
use quarry_llm::{ChatMessage, ChatRequest, LanguageModel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Extraction pipeline knobs.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub language: Language,
    pub entity_types: Vec<String>,
    /// Bounded "did I miss anything?" continuation rounds.
    pub max_gleanings: usize,
    /// Merged descriptions longer than this are condensed by the model.
    pub summary_token_threshold: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            entity_types: prompts::DEFAULT_ENTITY_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_gleanings: 1,
            summary_token_threshold: 500,
        }
    }
}

/// What one batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub chunks_processed: usize,
    pub entities: usize,
    pub relations: usize,
    /// True when the batch was discarded because extraction yielded no
    /// entities or no relations (likely a malfunctioning model).
    pub aborted: bool,
}

type EntityMap = HashMap<String, Vec<RawEntity>>;
type RelationMap = HashMap<(String, String), Vec<RawRelation>>;

/// Turns chunks into merged graph entities/relations plus vector-indexed
/// summaries.
pub struct ExtractionPipeline {
    llm: Arc<dyn LanguageModel>,
    graph: Arc<dyn GraphStore>,
    config: ExtractorConfig,
}

impl ExtractionPipeline {
    pub fn new(llm: Arc<dyn LanguageModel>, graph: Arc<dyn GraphStore>) -> Self {
        Self {
            llm,
            graph,
            config: ExtractorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    /// Extract raw entity/relation records from one chunk, with the
    /// gleaning continuation loop.
    async fn extract_chunk(&self, chunk: &Chunk) -> ExtractResult<(EntityMap, RelationMap)> {
        let language = self.config.language;
        let prompt =
            prompts::entity_extraction(language, &self.config.entity_types, &chunk.content);
        let mut output = self.llm.chat(ChatRequest::new(prompt.clone())).await?;
        let mut history = vec![
            ChatMessage::user(prompt),
            ChatMessage::assistant(output.clone()),
        ];

        for round in 0..self.config.max_gleanings {
            let continue_prompt = prompts::continue_extraction(language);
            let gleaned = self
                .llm
                .chat(ChatRequest::new(continue_prompt).with_history(history.clone()))
                .await?;
            history.push(ChatMessage::user(continue_prompt));
            history.push(ChatMessage::assistant(gleaned.clone()));
            output.push_str(&gleaned);
            if round + 1 == self.config.max_gleanings {
                break;
            }

            let verdict = self
                .llm
                .chat(
                    ChatRequest::new(prompts::if_loop_extraction(language))
                        .with_history(history.clone()),
                )
                .await?;
            if !verdict.trim().to_lowercase().contains("yes") {
                break;
            }
        }

        Ok(parse_extraction_output(&output, &chunk.hash))
    }

    /// Condense an over-long merged description, keeping the raw join if
    /// the model call fails.
    async fn condense(&self, name: &str, description: String) -> String {
        if token_len(&description) < self.config.summary_token_threshold {
            return description;
        }
        let pieces: Vec<&str> = description.split(GRAPH_FIELD_SEP).collect();
        let prompt = prompts::summarize_descriptions(self.config.language, name, &pieces);
        match self.llm.chat(ChatRequest::new(prompt)).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(entity = name, error = %e, "description summary failed, keeping concatenation");
                description
            }
        }
    }

    /// Process a batch of chunks: extract concurrently, merge per key,
    /// write graph + indexes + chunk store.
    ///
    /// Chunks already present in the chunk store are skipped. A batch in
    /// which extraction finds no entities or no relations at all is
    /// aborted without writing anything.
    pub async fn process_batch(
        &self,
        chunks: &[Chunk],
        indexes: &mut KnowledgeIndexes,
        chunk_store: &ChunkStore,
    ) -> ExtractResult<BatchReport> {
        let mut fresh: Vec<&Chunk> = Vec::new();
        for chunk in chunks {
            if chunk_store.exist(&chunk.hash)? {
                continue;
            }
            fresh.push(chunk);
        }
        if fresh.is_empty() {
            info!("no unseen chunks in batch");
            return Ok(BatchReport::default());
        }

        // independent per-chunk work fans out concurrently
        let results = join_all(fresh.iter().map(|c| self.extract_chunk(c))).await;

        let mut all_entities: EntityMap = HashMap::new();
        let mut all_relations: RelationMap = HashMap::new();
        for (chunk, result) in fresh.iter().zip(results) {
            match result {
                Ok((entities, relations)) => {
                    for (name, records) in entities {
                        all_entities.entry(name).or_default().extend(records);
                    }
                    for ((src, tgt), records) in relations {
                        // orientation-independent merge key
                        let key = if src <= tgt { (src, tgt) } else { (tgt, src) };
                        all_relations.entry(key).or_default().extend(records);
                    }
                }
                Err(e) => {
                    warn!(hash = %chunk.hash, error = %e, "chunk extraction failed, skipping");
                }
            }
        }

        if all_entities.is_empty() {
            warn!("batch extracted no entities, aborting (is the extraction model working?)");
            return Ok(BatchReport {
                aborted: true,
                ..Default::default()
            });
        }
        if all_relations.is_empty() {
            warn!("batch extracted no relations, aborting (is the extraction model working?)");
            return Ok(BatchReport {
                aborted: true,
                ..Default::default()
            });
        }

        // merge each distinct key against the stored state
        let mut entity_names: Vec<&String> = all_entities.keys().collect();
        entity_names.sort();
        let mut vertices: Vec<Vertex> = Vec::new();
        for name in entity_names {
            let existing = self.graph.get_node(name).await?;
            let mut merged = merge_entity(name, &all_entities[name], existing.as_ref());
            merged.description = self.condense(name, merged.description).await;
            vertices.push(merged);
        }

        let mut relation_keys: Vec<&(String, String)> = all_relations.keys().collect();
        relation_keys.sort();
        let mut edges: Vec<Edge> = Vec::new();
        for key in relation_keys {
            let (src, tgt) = key;
            let existing = self.graph.get_edge(src, tgt).await?;
            let mut merged = merge_relation(src, tgt, &all_relations[key], existing.as_ref());
            let label = format!("{} -> {}", src, tgt);
            merged.description = self.condense(&label, merged.description).await;
            edges.push(merged);
        }

        // endpoints the extractor never described still need a vertex
        let known: std::collections::HashSet<&str> =
            vertices.iter().map(|v| v.name.as_str()).collect();
        let mut placeholders: Vec<Vertex> = Vec::new();
        for edge in &edges {
            for endpoint in [&edge.src, &edge.tgt] {
                if known.contains(endpoint.as_str())
                    || placeholders.iter().any(|v| &v.name == endpoint)
                {
                    continue;
                }
                if self.graph.get_node(endpoint).await?.is_some() {
                    continue;
                }
                let mut v = Vertex::new(endpoint.clone())
                    .with_type("UNKNOWN")
                    .with_description(edge.description.clone());
                v.source_ids = edge.source_ids.clone();
                placeholders.push(v);
            }
        }
        vertices.extend(placeholders);

        let report = BatchReport {
            chunks_processed: fresh.len(),
            entities: vertices.len(),
            relations: edges.len(),
            aborted: false,
        };

        for v in &vertices {
            indexes.entity.upsert(
                Chunk::new(v.name.clone())
                    .with_metadata("entity_name", v.name.clone())
                    .with_metadata("entity_type", v.entity_type.clone())
                    .with_metadata("description", v.description.clone()),
            );
            indexes.entity_mix.upsert(
                Chunk::new(format!("{}{}", v.name, v.description))
                    .with_metadata("entity_name", v.name.clone())
                    .with_metadata("entity_type", v.entity_type.clone()),
            );
        }
        for e in &edges {
            indexes.relation.upsert(
                Chunk::new(e.keywords.clone())
                    .with_metadata("src_id", e.src.clone())
                    .with_metadata("tgt_id", e.tgt.clone())
                    .with_metadata("description", e.description.clone()),
            );
            indexes.relation_mix.upsert(
                Chunk::new(format!("{}{}{}{}", e.keywords, e.src, e.tgt, e.description))
                    .with_metadata("src_id", e.src.clone())
                    .with_metadata("tgt_id", e.tgt.clone()),
            );
        }

        self.graph.upsert(vertices, edges).await?;
        let owned: Vec<Chunk> = fresh.into_iter().cloned().collect();
        chunk_store.add(&owned)?;

        info!(
            chunks = report.chunks_processed,
            entities = report.entities,
            relations = report.relations,
            "batch extracted"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{RECORD_DELIMITER, TUPLE_DELIMITER};
    use quarry_core::MemoryGraph;
    use quarry_embed::HashEmbedder;
    use quarry_llm::MockModel;

    fn extraction_reply() -> String {
        format!(
            "(\"entity\"{t}\"Aspirin\"{t}\"science\"{t}\"A fever medication.\"){r}\
             (\"entity\"{t}\"Bayer\"{t}\"organization\"{t}\"A pharma company.\"){r}\
             (\"relationship\"{t}\"Aspirin\"{t}\"Bayer\"{t}\"Isolated at Bayer.\"{t}\"discovery\"{t}9)",
            t = TUPLE_DELIMITER,
            r = RECORD_DELIMITER,
        )
    }

    fn mock_llm() -> Arc<MockModel> {
        Arc::new(
            MockModel::new()
                .with_response("NLP expert", &extraction_reply())
                .with_response("MANY entities were missed", "")
                .with_response("still been missed", "NO"),
        )
    }

    #[tokio::test]
    async fn batch_builds_graph_and_indexes() {
        let graph = Arc::new(MemoryGraph::new());
        let pipeline = ExtractionPipeline::new(mock_llm(), graph.clone());
        let mut indexes = KnowledgeIndexes::default();
        let store = ChunkStore::in_memory().unwrap();

        let chunks = vec![Chunk::new("Aspirin treats fever. Bayer isolated it.")];
        let report = pipeline
            .process_batch(&chunks, &mut indexes, &store)
            .await
            .unwrap();
        assert!(!report.aborted);
        assert_eq!(report.chunks_processed, 1);

        let aspirin = graph.get_node("ASPIRIN").await.unwrap().unwrap();
        assert_eq!(aspirin.entity_type, "SCIENCE");
        assert!(aspirin.source_ids.contains(&chunks[0].hash));

        let edge = graph.get_edge("ASPIRIN", "BAYER").await.unwrap().unwrap();
        assert!((edge.weight - 9.0).abs() < f64::EPSILON);

        assert_eq!(indexes.entity.len(), 2);
        assert_eq!(indexes.relation.len(), 1);
        assert!(store.exist(&chunks[0].hash).unwrap());

        let embedder = HashEmbedder::default_dimension();
        indexes.build(&embedder).unwrap();
        let hits = indexes
            .entity
            .similarity_search(&embedder, "ASPIRIN", 0.2)
            .unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn seen_chunks_are_skipped() {
        let graph = Arc::new(MemoryGraph::new());
        let llm = mock_llm();
        let pipeline = ExtractionPipeline::new(llm.clone(), graph);
        let mut indexes = KnowledgeIndexes::default();
        let store = ChunkStore::in_memory().unwrap();

        let chunks = vec![Chunk::new("Aspirin treats fever.")];
        pipeline
            .process_batch(&chunks, &mut indexes, &store)
            .await
            .unwrap();
        let calls_after_first = llm.call_count();

        let report = pipeline
            .process_batch(&chunks, &mut indexes, &store)
            .await
            .unwrap();
        assert_eq!(report.chunks_processed, 0);
        assert_eq!(llm.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn empty_extraction_aborts_batch() {
        let graph = Arc::new(MemoryGraph::new());
        // model returns nothing parseable
        let llm = Arc::new(MockModel::new().with_default("no records here"));
        let pipeline = ExtractionPipeline::new(llm, graph.clone());
        let mut indexes = KnowledgeIndexes::default();
        let store = ChunkStore::in_memory().unwrap();

        let chunks = vec![Chunk::new("some content")];
        let report = pipeline
            .process_batch(&chunks, &mut indexes, &store)
            .await
            .unwrap();
        assert!(report.aborted);
        assert_eq!(graph.vertex_count(), 0);
        assert!(indexes.entity.is_empty());
        assert!(!store.exist(&chunks[0].hash).unwrap());
    }

    #[tokio::test]
    async fn repeated_extraction_merges_instead_of_duplicating() {
        let graph = Arc::new(MemoryGraph::new());
        let pipeline = ExtractionPipeline::new(mock_llm(), graph.clone());
        let mut indexes = KnowledgeIndexes::default();
        let store = ChunkStore::in_memory().unwrap();

        pipeline
            .process_batch(&[Chunk::new("first doc about aspirin")], &mut indexes, &store)
            .await
            .unwrap();
        pipeline
            .process_batch(&[Chunk::new("second doc about aspirin")], &mut indexes, &store)
            .await
            .unwrap();

        assert_eq!(graph.vertex_count(), 2);
        let aspirin = graph.get_node("ASPIRIN").await.unwrap().unwrap();
        // both chunks contributed provenance
        assert_eq!(aspirin.source_ids.len(), 2);
        let edge = graph.get_edge("ASPIRIN", "BAYER").await.unwrap().unwrap();
        assert!((edge.weight - 18.0).abs() < f64::EPSILON);
    }
}
