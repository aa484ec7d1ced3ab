//! Vector index pairing the ANN graph with its chunk list.

use crate::{AnnParams, DistanceStrategy, IndexResult, NavigableGraph};
use quarry_core::Chunk;
use quarry_embed::Embedder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

const INDEX_FILE: &str = "index.json";

/// An ANN index over chunks, searchable by embedding or by text.
///
/// Chunks are upserted (deduplicated by hash) into a pending list, then
/// [`build`](VectorIndex::build) embeds the pending tail and extends the
/// ANN graph. Only built chunks are searchable.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    hash2idx: HashMap<String, usize>,
    ann: NavigableGraph,
    /// Chunks `[0, built)` are in the ANN graph; the rest are pending.
    built: usize,
    top_k: usize,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new(DistanceStrategy::default(), AnnParams::default())
    }
}

impl VectorIndex {
    pub fn new(strategy: DistanceStrategy, params: AnnParams) -> Self {
        Self {
            chunks: Vec::new(),
            hash2idx: HashMap::new(),
            ann: NavigableGraph::new(strategy, params),
            built: 0,
            top_k: 30,
        }
    }

    /// How many results `search` returns at most.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn strategy(&self) -> DistanceStrategy {
        self.ann.strategy()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of chunks not yet embedded into the ANN graph.
    pub fn pending(&self) -> usize {
        self.chunks.len() - self.built
    }

    /// Add a chunk unless its hash is already present. Returns whether it
    /// was new.
    pub fn upsert(&mut self, chunk: Chunk) -> bool {
        if self.hash2idx.contains_key(&chunk.hash) {
            return false;
        }
        self.hash2idx.insert(chunk.hash.clone(), self.chunks.len());
        self.chunks.push(chunk);
        true
    }

    pub fn get(&self, hash: &str) -> Option<&Chunk> {
        self.hash2idx.get(hash).map(|&i| &self.chunks[i])
    }

    /// Embed pending chunks and extend the ANN graph.
    ///
    /// A chunk whose embedding fails is dropped from the index with a
    /// warning; the rest of the batch continues. Returns how many chunks
    /// were added.
    pub fn build(&mut self, embedder: &dyn Embedder) -> IndexResult<usize> {
        let pending = self.chunks.split_off(self.built);
        for chunk in &pending {
            self.hash2idx.remove(&chunk.hash);
        }

        let mut added = 0;
        for chunk in pending {
            let vector = match embedder.embed(&chunk.content) {
                Ok(v) => v,
                Err(e) => {
                    warn!(hash = %chunk.hash, error = %e, "skipping chunk: embedding failed");
                    continue;
                }
            };
            self.ann.insert(vector)?;
            self.hash2idx.insert(chunk.hash.clone(), self.chunks.len());
            self.chunks.push(chunk);
            added += 1;
        }
        self.built = self.chunks.len();
        Ok(added)
    }

    /// Nearest chunks to an embedding, `(chunk, relevance)` descending.
    pub fn search(&self, embedding: &[f32]) -> Vec<(&Chunk, f32)> {
        let strategy = self.ann.strategy();
        self.ann
            .search(embedding, self.top_k)
            .into_iter()
            .map(|(idx, raw)| (&self.chunks[idx], strategy.relevance(raw)))
            .collect()
    }

    /// Embed a query and return chunks clearing `threshold`.
    ///
    /// When nothing clears the threshold the best score seen is logged, so
    /// threshold tuning has something to look at.
    pub fn similarity_search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        threshold: f32,
    ) -> IndexResult<Vec<(&Chunk, f32)>> {
        if self.ann.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = embedder.embed(query)?;
        let pairs = self.search(&embedding);

        let best = pairs
            .iter()
            .map(|(_, s)| *s)
            .fold(f32::NEG_INFINITY, f32::max);
        let kept: Vec<(&Chunk, f32)> = pairs
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .collect();
        if kept.is_empty() {
            info!(highest_score = best, threshold, "no chunk cleared threshold");
        }
        Ok(kept)
    }

    /// Persist the index as JSON under `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> IndexResult<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let data = serde_json::to_string(self)
            .map_err(|e| crate::IndexError::Serialization(e.to_string()))?;
        std::fs::write(dir.join(INDEX_FILE), data)?;
        Ok(())
    }

    /// Load an index saved by [`save`](VectorIndex::save); a missing
    /// directory or file yields an empty index.
    pub fn load(dir: impl AsRef<Path>) -> IndexResult<Self> {
        let path = dir.as_ref().join(INDEX_FILE);
        if !path.exists() {
            info!(path = %path.display(), "vector index missing, starting empty");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| crate::IndexError::Serialization(e.to_string()))
    }
}
