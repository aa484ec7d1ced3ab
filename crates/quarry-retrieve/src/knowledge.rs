//! Entity-centric ("local") and relation-centric ("global") context
//! assembly around keyword matches.

use crate::{prompts, Evidence, RetrieveResource, RetrieveResult, Retriever};
use async_trait::async_trait;
use quarry_core::{truncate_by_token_budget, Chunk, Direction, Edge, Query, Vertex};
use quarry_extract::KnowledgeIndexes;
use quarry_index::ChunkStore;
use quarry_llm::ChatRequest;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Directory under the work dir holding the chunk store.
pub(crate) const CHUNK_DB_DIR: &str = "db_chunk";

/// Parse the keyword-decomposition reply, tolerating prose around the
/// JSON object.
fn parse_keywords(reply: &str) -> Option<(String, String)> {
    let parsed: serde_json::Value = serde_json::from_str(reply.trim()).ok().or_else(|| {
        // fallback: take whatever sits between the first brace pair
        let start = reply.find('{')?;
        let end = reply[start..].find('}')? + start;
        serde_json::from_str(&reply[start..=end]).ok()
    })?;

    let join = |key: &str| -> String {
        parsed
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    };
    Some((join("high_level_keywords"), join("low_level_keywords")))
}

/// Builds evidence from the knowledge graph around keyword matches.
pub struct KnowledgeRetriever {
    resource: RetrieveResource,
    indexes: KnowledgeIndexes,
    chunk_store: ChunkStore,
    dense_threshold: f32,
    high_level_top_k: usize,
    low_level_top_k: usize,
}

impl KnowledgeRetriever {
    /// Load indexes and chunk store from a work directory.
    pub fn open(resource: RetrieveResource, work_dir: &Path) -> RetrieveResult<Self> {
        if !work_dir.exists() {
            warn!(path = %work_dir.display(), "work dir does not exist, indexes will be empty");
        }
        let indexes = KnowledgeIndexes::load(work_dir)?;
        let chunk_store = ChunkStore::open(work_dir.join(CHUNK_DB_DIR))?;
        Ok(Self::with_components(resource, indexes, chunk_store))
    }

    /// Assemble from already-loaded components.
    pub fn with_components(
        resource: RetrieveResource,
        indexes: KnowledgeIndexes,
        chunk_store: ChunkStore,
    ) -> Self {
        Self {
            resource,
            indexes,
            chunk_store,
            dense_threshold: 0.2,
            high_level_top_k: 5,
            low_level_top_k: 6,
        }
    }

    /// One model call splitting the query into high-level and low-level
    /// keyword strings. Unparsable output degrades to empty keywords.
    pub async fn decompose_to_keywords(
        &self,
        query: &Query,
    ) -> RetrieveResult<(String, String)> {
        let prompt = prompts::keywords_extraction(query.language, &query.text);
        let reply = self.resource.llm.chat(ChatRequest::new(prompt)).await?;
        match parse_keywords(&reply) {
            Some(pair) => Ok(pair),
            None => {
                warn!(reply = %reply, "keyword decomposition unparsable");
                Ok((String::new(), String::new()))
            }
        }
    }

    async fn vertex_cached(
        &self,
        cache: &mut HashMap<String, Option<Vertex>>,
        name: &str,
    ) -> RetrieveResult<Option<Vertex>> {
        if let Some(hit) = cache.get(name) {
            return Ok(hit.clone());
        }
        let vertex = self.resource.graph.get_node(name).await?;
        cache.insert(name.to_string(), vertex.clone());
        Ok(vertex)
    }

    fn fetch_chunk(&self, hash: &str) -> RetrieveResult<Option<Chunk>> {
        let chunk = self.chunk_store.get(hash)?;
        if chunk.is_none() {
            // referential gap: the graph mentions a chunk the store lost
            warn!(hash, "text chunk missing, storage may be damaged");
        }
        Ok(chunk)
    }

    /// Entity-centric context: matched entities, their one-hop relations,
    /// and source chunks ranked by (extraction order, shared-neighbor
    /// corroboration).
    async fn build_local_context(
        &self,
        query: &Query,
        hits: &[(Chunk, f32)],
    ) -> RetrieveResult<Evidence> {
        if hits.is_empty() {
            return Ok(Evidence::new());
        }

        let mut vertex_cache: HashMap<String, Option<Vertex>> = HashMap::new();
        let mut nodes: Vec<(String, Vertex, usize, Vec<Edge>)> = Vec::new();
        for (chunk, _) in hits {
            let Some(name) = chunk.meta_str("entity_name").map(|s| s.to_string()) else {
                continue;
            };
            let Some(vertex) = self.vertex_cached(&mut vertex_cache, &name).await? else {
                warn!(entity = %name, "indexed entity missing from graph");
                continue;
            };
            let degree = self.resource.graph.node_degree(&name).await?;
            let edges = self
                .resource
                .graph
                .neighbor_edges(&name, Direction::Both)
                .await?;
            nodes.push((name, vertex, degree, edges));
        }

        // rank candidate source chunks: extraction order first, then how
        // many one-hop neighbors corroborate the same chunk
        let mut ranked_hashes: Vec<(String, usize, usize)> = Vec::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();
        for (order, (name, vertex, _, edges)) in nodes.iter().enumerate() {
            for hash in &vertex.source_ids {
                if !seen_hashes.insert(hash.clone()) {
                    continue;
                }
                let mut corroboration = 0;
                for edge in edges {
                    let other = if &edge.src == name {
                        &edge.tgt
                    } else {
                        &edge.src
                    };
                    if let Some(neighbor) = self.vertex_cached(&mut vertex_cache, other).await? {
                        if neighbor.source_ids.contains(hash) {
                            corroboration += 1;
                        }
                    }
                }
                ranked_hashes.push((hash.clone(), order, corroboration));
            }
        }
        ranked_hashes.sort_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)));

        let mut chunks: Vec<Chunk> = Vec::new();
        for (hash, _, _) in &ranked_hashes {
            if let Some(chunk) = self.fetch_chunk(hash)? {
                chunks.push(chunk);
            }
        }
        let chunks =
            truncate_by_token_budget(chunks, |c| c.content.as_str(), query.max_token_for_text_unit);

        // one-hop relations across all matched entities
        let mut edge_rows: Vec<(Edge, usize)> = Vec::new();
        let mut seen_edges: HashSet<(String, String)> = HashSet::new();
        for (_, _, _, edges) in &nodes {
            for edge in edges {
                if !seen_edges.insert((edge.src.clone(), edge.tgt.clone())) {
                    continue;
                }
                let rank = self.resource.graph.edge_degree(&edge.src, &edge.tgt).await?;
                edge_rows.push((edge.clone(), rank));
            }
        }
        edge_rows.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(b.0.weight.partial_cmp(&a.0.weight).unwrap_or(std::cmp::Ordering::Equal))
        });
        let relation_rows: Vec<Vec<String>> = edge_rows
            .iter()
            .map(|(e, rank)| {
                vec![
                    e.src.clone(),
                    e.tgt.clone(),
                    e.description.clone(),
                    e.keywords.clone(),
                    e.weight.to_string(),
                    rank.to_string(),
                ]
            })
            .collect();
        let relation_rows = truncate_by_token_budget(
            relation_rows,
            |r| r[2].as_str(),
            query.max_token_for_global_context,
        );

        let entity_rows: Vec<Vec<String>> = nodes
            .iter()
            .map(|(name, vertex, degree, _)| {
                vec![
                    name.clone(),
                    or_unknown(&vertex.entity_type),
                    or_unknown(&vertex.description),
                    degree.to_string(),
                ]
            })
            .collect();
        let entity_rows = truncate_by_token_budget(
            entity_rows,
            |r| r[2].as_str(),
            query.max_token_for_local_context,
        );

        info!(
            entities = entity_rows.len(),
            relations = relation_rows.len(),
            text_units = chunks.len(),
            "local context assembled"
        );
        Ok(Evidence {
            entity_rows,
            relation_rows,
            source_chunks: chunks,
            sub_qa: Vec::new(),
        })
    }

    /// Relation-centric context: matched relations ranked by degree and
    /// weight, their endpoint entities, and source chunks in match order.
    async fn build_global_context(
        &self,
        query: &Query,
        hits: &[(Chunk, f32)],
    ) -> RetrieveResult<Evidence> {
        if hits.is_empty() {
            return Ok(Evidence::new());
        }

        let mut edge_rows: Vec<(Edge, usize)> = Vec::new();
        for (chunk, _) in hits {
            let (Some(src), Some(tgt)) = (chunk.meta_str("src_id"), chunk.meta_str("tgt_id"))
            else {
                continue;
            };
            let Some(edge) = self.resource.graph.get_edge(src, tgt).await? else {
                warn!(src, tgt, "indexed relation missing from graph");
                continue;
            };
            let rank = self.resource.graph.edge_degree(src, tgt).await?;
            edge_rows.push((edge, rank));
        }
        edge_rows.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(b.0.weight.partial_cmp(&a.0.weight).unwrap_or(std::cmp::Ordering::Equal))
        });

        let relation_rows: Vec<Vec<String>> = edge_rows
            .iter()
            .map(|(e, rank)| {
                vec![
                    e.src.clone(),
                    e.tgt.clone(),
                    e.description.clone(),
                    e.keywords.clone(),
                    e.weight.to_string(),
                    rank.to_string(),
                ]
            })
            .collect();
        let relation_rows = truncate_by_token_budget(
            relation_rows,
            |r| r[2].as_str(),
            query.max_token_for_global_context,
        );

        // endpoint entities, first-seen order
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (edge, _) in &edge_rows {
            for name in [&edge.src, &edge.tgt] {
                if seen.insert(name.clone()) {
                    names.push(name.clone());
                }
            }
        }
        let mut entity_rows: Vec<Vec<String>> = Vec::new();
        for name in &names {
            let Some(vertex) = self.resource.graph.get_node(name).await? else {
                continue;
            };
            let degree = self.resource.graph.node_degree(name).await?;
            entity_rows.push(vec![
                name.clone(),
                or_unknown(&vertex.entity_type),
                or_unknown(&vertex.description),
                degree.to_string(),
            ]);
        }
        let entity_rows = truncate_by_token_budget(
            entity_rows,
            |r| r[2].as_str(),
            query.max_token_for_local_context,
        );

        // source chunks in relation match order
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();
        for (edge, _) in &edge_rows {
            for hash in &edge.source_ids {
                if !seen_hashes.insert(hash.clone()) {
                    continue;
                }
                if let Some(chunk) = self.fetch_chunk(hash)? {
                    chunks.push(chunk);
                }
            }
        }
        let chunks =
            truncate_by_token_budget(chunks, |c| c.content.as_str(), query.max_token_for_text_unit);

        info!(
            entities = entity_rows.len(),
            relations = relation_rows.len(),
            text_units = chunks.len(),
            "global context assembled"
        );
        Ok(Evidence {
            entity_rows,
            relation_rows,
            source_chunks: chunks,
            sub_qa: Vec::new(),
        })
    }
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        "UNKNOWN".to_string()
    } else {
        value.to_string()
    }
}

#[async_trait]
impl Retriever for KnowledgeRetriever {
    async fn explore(&self, query: &Query) -> RetrieveResult<Evidence> {
        let (hl_keywords, ll_keywords) = self.decompose_to_keywords(query).await?;

        let mut local = Evidence::new();
        if !(hl_keywords.is_empty() && ll_keywords.is_empty()) {
            let hits = self.indexes.entity.similarity_search(
                self.resource.embedder.as_ref(),
                &query.text,
                self.dense_threshold,
            )?;
            let hits: Vec<(Chunk, f32)> = hits
                .into_iter()
                .take(self.low_level_top_k)
                .map(|(c, s)| (c.clone(), s))
                .collect();
            local = self.build_local_context(query, &hits).await?;
        }

        let mut global = Evidence::new();
        if !hl_keywords.is_empty() {
            let hits = self.indexes.relation.similarity_search(
                self.resource.embedder.as_ref(),
                &query.text,
                self.dense_threshold,
            )?;
            let hits: Vec<(Chunk, f32)> = hits
                .into_iter()
                .take(self.high_level_top_k)
                .map(|(c, s)| (c.clone(), s))
                .collect();
            global = self.build_global_context(query, &hits).await?;
        }

        // local first; duplicates fall out of the union
        Ok(local.combine(global))
    }

    /// Max relevance across entity/relation indexes for the decomposed
    /// keywords; callers treat scores under their reject threshold as
    /// "answer ungrounded".
    async fn similarity_score(&self, query: &Query) -> RetrieveResult<f32> {
        let (hl_keywords, ll_keywords) = self.decompose_to_keywords(query).await?;

        let mut best = 0.0f32;
        if !ll_keywords.is_empty() {
            let pairs = self.indexes.entity.similarity_search(
                self.resource.embedder.as_ref(),
                &ll_keywords,
                0.0,
            )?;
            if let Some((_, score)) = pairs.first() {
                best = best.max(*score);
            }
        }
        if !hl_keywords.is_empty() {
            let pairs = self.indexes.relation.similarity_search(
                self.resource.embedder.as_ref(),
                &hl_keywords,
                0.0,
            )?;
            if let Some((_, score)) = pairs.first() {
                best = best.max(*score);
            }
        }
        Ok(best)
    }
}
