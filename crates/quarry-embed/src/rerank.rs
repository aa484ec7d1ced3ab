//! Reranking seam.

use crate::{EmbedResult, Embedder};
use std::sync::Arc;

/// Orders candidate texts by relevance to a query.
pub trait Reranker: Send + Sync {
    /// Relevance of one candidate.
    fn score(&self, query: &str, candidate: &str) -> EmbedResult<f32>;

    /// Candidate indices with scores, descending by relevance.
    fn sort(&self, query: &str, candidates: &[String]) -> EmbedResult<Vec<(usize, f32)>> {
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| Ok((i, self.score(query, c)?)))
            .collect::<EmbedResult<_>>()?;
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }
}

/// Reranker backed by embedding cosine similarity.
///
/// A cross-encoder backend would implement [`Reranker`] directly; this is
/// the always-available default over whatever [`Embedder`] is in use.
pub struct EmbedReranker {
    embedder: Arc<dyn Embedder>,
}

impl EmbedReranker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

impl Reranker for EmbedReranker {
    fn score(&self, query: &str, candidate: &str) -> EmbedResult<f32> {
        self.embedder.relevance(query, candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;

    #[test]
    fn sort_is_descending_and_prefers_exact() {
        let reranker = EmbedReranker::new(Arc::new(HashEmbedder::default_dimension()));
        let candidates = vec![
            "weather forecast".to_string(),
            "rice genome assembly".to_string(),
            "rice genome".to_string(),
        ];
        let ranked = reranker.sort("rice genome", &candidates).unwrap();
        assert_eq!(ranked[0].0, 2);
        for pair in ranked.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }
}
