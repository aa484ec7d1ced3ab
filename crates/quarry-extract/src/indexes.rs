//! The four paired vector indexes the extraction pipeline maintains.

use crate::ExtractError;
use quarry_embed::Embedder;
use quarry_index::{AnnParams, DistanceStrategy, VectorIndex};
use std::path::Path;

/// Index result alias local to this crate.
type Result<T> = std::result::Result<T, ExtractError>;

/// Entity and relation indexes in precise-name and semantic-mix variants.
///
/// The name-only indexes give exact lookups (entity resolution in the
/// reasoning engine); the mixed indexes fold descriptions in for semantic
/// recall (keyword-driven retrieval).
pub struct KnowledgeIndexes {
    pub entity: VectorIndex,
    pub entity_mix: VectorIndex,
    pub relation: VectorIndex,
    pub relation_mix: VectorIndex,
}

impl Default for KnowledgeIndexes {
    fn default() -> Self {
        Self::new(DistanceStrategy::default(), AnnParams::default())
    }
}

impl KnowledgeIndexes {
    pub fn new(strategy: DistanceStrategy, params: AnnParams) -> Self {
        Self {
            entity: VectorIndex::new(strategy, params),
            entity_mix: VectorIndex::new(strategy, params),
            relation: VectorIndex::new(strategy, params),
            relation_mix: VectorIndex::new(strategy, params),
        }
    }

    /// Embed pending chunks in all four indexes. Returns the number of
    /// chunks added.
    pub fn build(&mut self, embedder: &dyn Embedder) -> Result<usize> {
        let mut added = 0;
        added += self.entity.build(embedder)?;
        added += self.entity_mix.build(embedder)?;
        added += self.relation.build(embedder)?;
        added += self.relation_mix.build(embedder)?;
        Ok(added)
    }

    /// Persist all four indexes under `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        self.entity.save(dir.join("entity"))?;
        self.entity_mix.save(dir.join("entity_mix"))?;
        self.relation.save(dir.join("relation"))?;
        self.relation_mix.save(dir.join("relation_mix"))?;
        Ok(())
    }

    /// Load indexes saved by [`save`](KnowledgeIndexes::save); missing
    /// directories yield empty indexes.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            entity: VectorIndex::load(dir.join("entity"))?,
            entity_mix: VectorIndex::load(dir.join("entity_mix"))?,
            relation: VectorIndex::load(dir.join("relation"))?,
            relation_mix: VectorIndex::load(dir.join("relation_mix"))?,
        })
    }
}
