//! Executing a parsed plan against the graph, the indexes and the model.

use crate::logic::{EntityRef, LogicNode, NodeMeta, ReasoningSession, RelationRef};
use crate::{prompts, RetrieveError, RetrieveResource, RetrieveResult};
use quarry_core::{Direction, Edge, Language};
use quarry_index::{ChunkStore, VectorIndex};
use quarry_llm::ChatRequest;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Runs logic nodes in order, dispatching on the node kind.
pub struct PlanExecutor<'a> {
    resource: &'a RetrieveResource,
    entity_index: &'a VectorIndex,
    relation_index: &'a VectorIndex,
    chunk_store: &'a ChunkStore,
    dense_threshold: f32,
    language: Language,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(
        resource: &'a RetrieveResource,
        entity_index: &'a VectorIndex,
        relation_index: &'a VectorIndex,
        chunk_store: &'a ChunkStore,
        dense_threshold: f32,
        language: Language,
    ) -> Self {
        Self {
            resource,
            entity_index,
            relation_index,
            chunk_store,
            dense_threshold,
            language,
        }
    }

    /// Execute the whole plan in order. The first failing step aborts the
    /// attempt; the caller degrades to another strategy.
    pub async fn execute(
        &self,
        nodes: &[LogicNode],
        session: &mut ReasoningSession,
    ) -> RetrieveResult<()> {
        for node in nodes {
            info!(node = %node, "executing logic node");
            match node {
                LogicNode::GetSpo { s, p, o, meta } => {
                    self.run_get_spo(s, p, o, meta, session).await?
                }
                LogicNode::Count { set, alias, meta } => {
                    self.run_math("count", set, alias, meta, session).await?
                }
                LogicNode::Sum { set, alias, meta } => {
                    self.run_math("sum", set, alias, meta, session).await?
                }
                LogicNode::Compare { set, op, meta } => {
                    // informational only: recorded, never branches
                    let task = format!(
                        "{} (op: {op})",
                        prompts::math_task(self.language, "compare")
                    );
                    self.run_math_with_task(&task, set, "compare1", meta, session)
                        .await?
                }
                LogicNode::Output { aliases, .. } => {
                    session.mark_outputs(aliases);
                }
            }
        }
        Ok(())
    }

    /// Resolve a mention to its nearest indexed entity name, failing fast
    /// below the similarity floor: a misresolved entity would silently
    /// corrupt every later step.
    fn resolve_entity(&self, mention: &str) -> RetrieveResult<String> {
        let hits = self.entity_index.similarity_search(
            self.resource.embedder.as_ref(),
            mention,
            self.dense_threshold,
        )?;
        hits.first()
            .and_then(|(chunk, _)| chunk.meta_str("entity_name"))
            .map(|s| s.to_string())
            .ok_or_else(|| RetrieveError::ResolutionFailed {
                kind: "entity",
                name: mention.to_string(),
            })
    }

    /// Resolve a relation-type mention to indexed relation keywords.
    fn resolve_relation(&self, mention: &str) -> RetrieveResult<String> {
        let hits = self.relation_index.similarity_search(
            self.resource.embedder.as_ref(),
            mention,
            self.dense_threshold,
        )?;
        hits.first()
            .map(|(chunk, _)| chunk.content.clone())
            .ok_or_else(|| RetrieveError::ResolutionFailed {
                kind: "relation",
                name: mention.to_string(),
            })
    }

    /// Keep the rerank-ordered prefix of edges whose keywords stay above
    /// the threshold for the requested relation type. Valid only because
    /// candidates are sorted descending before the cut.
    fn filter_edges(&self, rel_type: Option<&str>, edges: Vec<Edge>) -> RetrieveResult<Vec<Edge>> {
        let Some(rel_type) = rel_type.filter(|t| !t.is_empty()) else {
            return Ok(edges);
        };
        if edges.is_empty() {
            return Ok(edges);
        }
        let texts: Vec<String> = edges.iter().map(|e| e.keywords.clone()).collect();
        let ranked = self.resource.reranker.sort(rel_type, &texts)?;
        let mut kept = Vec::new();
        for (idx, score) in ranked {
            if score < self.dense_threshold {
                break;
            }
            kept.push(edges[idx].clone());
        }
        Ok(kept)
    }

    fn collect_sources(edges: &[Edge]) -> BTreeSet<String> {
        edges
            .iter()
            .flat_map(|e| e.source_ids.iter().cloned())
            .collect()
    }

    /// Summarize the step's evidence into a sub-answer and record the
    /// binding plus provenance.
    async fn conclude(
        &self,
        alias: &str,
        chunk_hashes: BTreeSet<String>,
        meta: &NodeMeta,
        session: &mut ReasoningSession,
    ) -> RetrieveResult<()> {
        let mut references = String::new();
        for hash in &chunk_hashes {
            if let Some(chunk) = self.chunk_store.get(hash)? {
                references.push_str(&chunk.content);
                references.push('\n');
            } else {
                debug!(hash = %hash, "reference chunk missing from store");
            }
        }

        let prompt = prompts::naive_qa(
            self.language,
            &references,
            &meta.root_query,
            &session.log_json(),
            &meta.sub_query,
        );
        let sub_answer = self.resource.llm.chat(ChatRequest::new(prompt)).await?;

        session.bind(alias, sub_answer.clone());
        session.add_evidence(alias, chunk_hashes);
        session.push_log(meta.sub_query.clone(), sub_answer);
        Ok(())
    }

    async fn run_get_spo(
        &self,
        s: &EntityRef,
        p: &RelationRef,
        o: &EntityRef,
        meta: &NodeMeta,
        session: &mut ReasoningSession,
    ) -> RetrieveResult<()> {
        // a literal name or an earlier binding makes an endpoint "known";
        // literals also seed the alias so later steps can refer to it
        let s_name = s
            .name
            .clone()
            .or_else(|| session.binding(&s.alias).map(|v| v.to_string()));
        let o_name = o
            .name
            .clone()
            .or_else(|| session.binding(&o.alias).map(|v| v.to_string()));
        let p_type = p
            .rel_type
            .clone()
            .or_else(|| session.binding(&p.alias).map(|v| v.to_string()));
        if let Some(name) = &s.name {
            if session.binding(&s.alias).is_none() {
                session.bind(&s.alias, name.clone());
            }
        }
        if let Some(name) = &o.name {
            if session.binding(&o.alias).is_none() {
                session.bind(&o.alias, name.clone());
            }
        }
        if let Some(rel_type) = &p.rel_type {
            if session.binding(&p.alias).is_none() {
                session.bind(&p.alias, rel_type.clone());
            }
        }

        let graph = &self.resource.graph;
        match (&s_name, &o_name) {
            (Some(s_mention), Some(o_mention)) => {
                // both endpoints known: the relation between them is the answer
                let s_resolved = self.resolve_entity(s_mention)?;
                let o_resolved = self.resolve_entity(o_mention)?;
                let edges = graph
                    .connections(&s_resolved, &o_resolved, Direction::Both)
                    .await?;
                let edges = self.filter_edges(p_type.as_deref(), edges)?;
                self.conclude(&p.alias, Self::collect_sources(&edges), meta, session)
                    .await?;
            }
            (None, None) => {
                // endpoints unknown: locate them through the relation type
                let rel_type = p_type.ok_or_else(|| {
                    RetrieveError::PlanParse(format!(
                        "get_spo step '{}' names no entity and no relation type",
                        meta.sub_query
                    ))
                })?;
                let resolved = self.resolve_relation(&rel_type)?;
                let Some((src, tgt)) = graph.nodes_by_edge_keywords(&resolved).await? else {
                    return Err(RetrieveError::ResolutionFailed {
                        kind: "relation",
                        name: rel_type,
                    });
                };
                self.conclude(
                    &s.alias,
                    src.source_ids.iter().cloned().collect(),
                    meta,
                    session,
                )
                .await?;
                self.conclude(
                    &o.alias,
                    tgt.source_ids.iter().cloned().collect(),
                    meta,
                    session,
                )
                .await?;
            }
            // one endpoint known: one-hop traversal fills in the other
            (Some(mention), None) => {
                let resolved = self.resolve_entity(mention)?;
                let edges = graph.neighbor_edges(&resolved, Direction::Both).await?;
                let edges = self.filter_edges(p_type.as_deref(), edges)?;
                self.conclude(&o.alias, Self::collect_sources(&edges), meta, session)
                    .await?;
            }
            (None, Some(mention)) => {
                let resolved = self.resolve_entity(mention)?;
                let edges = graph.neighbor_edges(&resolved, Direction::Both).await?;
                let edges = self.filter_edges(p_type.as_deref(), edges)?;
                self.conclude(&s.alias, Self::collect_sources(&edges), meta, session)
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_math(
        &self,
        op: &str,
        set: &[String],
        alias: &str,
        meta: &NodeMeta,
        session: &mut ReasoningSession,
    ) -> RetrieveResult<()> {
        let task = prompts::math_task(self.language, op);
        self.run_math_with_task(&task, set, alias, meta, session)
            .await
    }

    /// Arithmetic is delegated to the model: inputs may be
    /// natural-language quantities with mixed units.
    async fn run_math_with_task(
        &self,
        task: &str,
        set: &[String],
        alias: &str,
        meta: &NodeMeta,
        session: &mut ReasoningSession,
    ) -> RetrieveResult<()> {
        let mut param_text = format!("parameter list: {}\n", serde_json::json!(set));
        for param in set {
            let trimmed = param.trim();
            if trimmed.parse::<f64>().is_ok() {
                continue;
            }
            let var = trimmed.strip_prefix('-').unwrap_or(trimmed);
            if let Some(value) = session.binding(var) {
                param_text.push_str(&format!("{var} = {value}\n"));
            }
        }

        let prompt = prompts::math(
            self.language,
            task,
            &param_text,
            &meta.root_query,
            &session.log_json(),
            &meta.sub_query,
        );
        let answer = self.resource.llm.chat(ChatRequest::new(prompt)).await?;

        session.bind(alias, answer.clone());
        session.add_evidence(alias, std::iter::empty::<String>());
        session.push_log(meta.sub_query.clone(), answer);
        Ok(())
    }
}
