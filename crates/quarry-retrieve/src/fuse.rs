//! Fusing evidence from several strategies.

use crate::{Evidence, RetrieveResource, RetrieveResult};
use quarry_core::{truncate_by_token_budget, Chunk, Query};

/// Merge several strategies' evidence: concatenate and dedup rows and
/// chunks, rerank chunks by query relevance, then truncate the ordered
/// list by cumulative token budget. Dropped chunks are dropped wholesale.
pub fn fuse(
    resource: &RetrieveResource,
    query: &Query,
    evidences: Vec<Evidence>,
) -> RetrieveResult<Evidence> {
    let mut iter = evidences.into_iter();
    let Some(first) = iter.next() else {
        return Ok(Evidence::new());
    };
    let mut merged = first;
    for evidence in iter {
        merged = merged.combine(evidence);
    }

    let contents: Vec<String> = merged
        .source_chunks
        .iter()
        .map(|c| c.content.clone())
        .collect();
    let ranked = resource.reranker.sort(&query.text, &contents)?;
    let reordered: Vec<Chunk> = ranked
        .iter()
        .map(|(idx, _)| merged.source_chunks[*idx].clone())
        .collect();

    merged.source_chunks = truncate_by_token_budget(
        reordered,
        |c| c.content.as_str(),
        query.max_token_for_text_unit,
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::MemoryGraph;
    use quarry_embed::HashEmbedder;
    use quarry_llm::MockModel;
    use std::sync::Arc;

    fn resource() -> RetrieveResource {
        RetrieveResource::new(
            Arc::new(MockModel::new()),
            Arc::new(HashEmbedder::default_dimension()),
            Arc::new(MemoryGraph::new()),
        )
    }

    fn evidence_with(chunks: &[&str]) -> Evidence {
        let mut e = Evidence::new();
        for c in chunks {
            e.add_source(Chunk::new(*c));
        }
        e
    }

    #[test]
    fn duplicated_chunks_survive_once() {
        let resource = resource();
        let query = Query::new("rice genome");
        let a = evidence_with(&["rice genome study", "weather report"]);
        let b = evidence_with(&["rice genome study", "stock prices"]);

        let fused = fuse(&resource, &query, vec![a, b]).unwrap();
        let count = fused
            .source_chunks
            .iter()
            .filter(|c| c.content == "rice genome study")
            .count();
        assert_eq!(count, 1);
        assert_eq!(fused.source_chunks.len(), 3);
    }

    #[test]
    fn output_is_sorted_by_relevance() {
        let resource = resource();
        let query = Query::new("rice genome");
        let a = evidence_with(&["weather report today", "rice genome study"]);

        let fused = fuse(&resource, &query, vec![a, Evidence::new()]).unwrap();
        assert_eq!(fused.source_chunks[0].content, "rice genome study");
    }

    #[test]
    fn truncates_to_token_budget() {
        let resource = resource();
        let mut query = Query::new("rice");
        query.max_token_for_text_unit = 2;
        let a = evidence_with(&["rice rice rice rice", "rice again and again", "rice more"]);

        let fused = fuse(&resource, &query, vec![a]).unwrap();
        assert!(fused.source_chunks.len() < 3);
    }

    #[test]
    fn empty_input_fuses_empty() {
        let resource = resource();
        let query = Query::new("anything");
        let fused = fuse(&resource, &query, vec![]).unwrap();
        assert!(fused.is_empty());
    }
}
