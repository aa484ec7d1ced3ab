//! Content chunks and queries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Number of hex characters kept from the SHA-256 digest. 64 bits is short
/// enough for logs and ids while keeping accidental collision negligible.
const HASH_LEN: usize = 16;

/// Compute the stable content hash used as chunk identity.
pub fn chunk_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(HASH_LEN);
    for byte in digest.iter().take(HASH_LEN / 2) {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// What kind of content a chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    Text,
    Image,
    Audio,
}

/// A piece of content with a stable content-derived identity.
///
/// Chunks are immutable: they are created at ingestion, deduplicated by
/// hash on insert, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Content digest; identity of the chunk.
    pub hash: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub modality: Modality,
}

impl Chunk {
    /// Create a text chunk, deriving its hash from the content.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            hash: chunk_hash(&content),
            content,
            metadata: HashMap::new(),
            modality: Modality::Text,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the modality.
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    /// Fetch a metadata entry as a string, if present and a string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Prompt language for model calls and rendered evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    ZhCn,
}

/// A retrieval query with its token budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub language: Language,
    /// Budget for source chunks in a context.
    pub max_token_for_text_unit: usize,
    /// Budget for the entity table.
    pub max_token_for_local_context: usize,
    /// Budget for the relation table.
    pub max_token_for_global_context: usize,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: Language::default(),
            max_token_for_text_unit: 4000,
            max_token_for_local_context: 4000,
            max_token_for_global_context: 4000,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        let a = Chunk::new("the quick brown fox");
        let b = Chunk::new("the quick brown fox");
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 16);
    }

    #[test]
    fn hash_differs_for_distinct_content() {
        let a = Chunk::new("alpha");
        let b = Chunk::new("beta");
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn metadata_builder() {
        let c = Chunk::new("content")
            .with_metadata("entity_name", "ASPIRIN")
            .with_metadata("weight", 3);
        assert_eq!(c.meta_str("entity_name"), Some("ASPIRIN"));
        assert_eq!(c.metadata.len(), 2);
    }

    #[test]
    fn chunk_roundtrips_through_json() {
        let c = Chunk::new("roundtrip").with_metadata("source", "doc.md");
        let json = serde_json::to_string(&c).unwrap();
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
