//! Session state threaded through plan execution.

use crate::{Evidence, RetrieveResult, SubQa};
use quarry_index::ChunkStore;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Alias bindings, per-alias chunk provenance, output selection and the
/// ordered sub-question log for one plan execution. Created per plan,
/// consumed into [`Evidence`].
#[derive(Debug, Default)]
pub struct ReasoningSession {
    bindings: HashMap<String, String>,
    evidence: HashMap<String, BTreeSet<String>>,
    outputs: Vec<String>,
    log: Vec<SubQa>,
}

impl ReasoningSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an alias to the text later steps consume.
    pub fn bind(&mut self, alias: &str, value: impl Into<String>) {
        self.bindings.insert(alias.to_string(), value.into());
    }

    pub fn binding(&self, alias: &str) -> Option<&str> {
        self.bindings.get(alias).map(|s| s.as_str())
    }

    /// Attach chunk provenance to an alias (unioned across steps).
    pub fn add_evidence(&mut self, alias: &str, chunk_hashes: impl IntoIterator<Item = String>) {
        self.evidence
            .entry(alias.to_string())
            .or_default()
            .extend(chunk_hashes);
    }

    /// Record one step of the sub-question log.
    pub fn push_log(&mut self, sub_query: impl Into<String>, sub_answer: impl Into<String>) {
        self.log.push(SubQa {
            sub_query: sub_query.into(),
            sub_answer: sub_answer.into(),
        });
    }

    /// Mark aliases whose evidence the final reply should surface.
    pub fn mark_outputs(&mut self, aliases: &[String]) {
        for alias in aliases {
            if !self.outputs.contains(alias) {
                self.outputs.push(alias.clone());
            }
        }
    }

    /// The accumulated log as a JSON fragment for "known so far" prompts.
    pub fn log_json(&self) -> String {
        serde_json::to_string(&self.log).unwrap_or_default()
    }

    /// Resolve the selected (or, absent any selection, all) provenance
    /// into evidence chunks. An output alias that was never bound simply
    /// contributes nothing.
    pub fn into_evidence(self, chunk_store: &ChunkStore) -> RetrieveResult<Evidence> {
        let mut hashes: BTreeSet<String> = BTreeSet::new();
        if self.outputs.is_empty() {
            for set in self.evidence.values() {
                hashes.extend(set.iter().cloned());
            }
        } else {
            for alias in &self.outputs {
                if let Some(set) = self.evidence.get(alias) {
                    hashes.extend(set.iter().cloned());
                }
            }
        }

        let mut evidence = Evidence::new();
        evidence.sub_qa = self.log;
        for hash in hashes {
            match chunk_store.get(&hash)? {
                Some(chunk) => evidence.add_source(chunk),
                None => warn!(hash = %hash, "evidence chunk missing from store"),
            }
        }
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Chunk;

    #[test]
    fn output_selection_restricts_evidence() {
        let store = ChunkStore::in_memory().unwrap();
        let wanted = Chunk::new("wanted");
        let unwanted = Chunk::new("unwanted");
        store.add(&[wanted.clone(), unwanted.clone()]).unwrap();

        let mut session = ReasoningSession::new();
        session.add_evidence("p1", [wanted.hash.clone()]);
        session.add_evidence("s1", [unwanted.hash.clone()]);
        session.mark_outputs(&["p1".to_string()]);

        let evidence = session.into_evidence(&store).unwrap();
        assert_eq!(evidence.source_chunks.len(), 1);
        assert_eq!(evidence.source_chunks[0].content, "wanted");
    }

    #[test]
    fn no_outputs_surfaces_everything() {
        let store = ChunkStore::in_memory().unwrap();
        let a = Chunk::new("a side");
        let b = Chunk::new("b side");
        store.add(&[a.clone(), b.clone()]).unwrap();

        let mut session = ReasoningSession::new();
        session.add_evidence("x", [a.hash.clone()]);
        session.add_evidence("y", [b.hash.clone()]);

        let evidence = session.into_evidence(&store).unwrap();
        assert_eq!(evidence.source_chunks.len(), 2);
    }

    #[test]
    fn unbound_output_alias_yields_empty_evidence() {
        let store = ChunkStore::in_memory().unwrap();
        let mut session = ReasoningSession::new();
        session.mark_outputs(&["never_bound".to_string()]);
        let evidence = session.into_evidence(&store).unwrap();
        assert!(evidence.source_chunks.is_empty());
    }

    #[test]
    fn missing_chunks_are_skipped_not_fatal() {
        let store = ChunkStore::in_memory().unwrap();
        let mut session = ReasoningSession::new();
        session.add_evidence("p1", ["deadbeefdeadbeef".to_string()]);
        let evidence = session.into_evidence(&store).unwrap();
        assert!(evidence.source_chunks.is_empty());
    }

    #[test]
    fn log_preserves_order() {
        let mut session = ReasoningSession::new();
        session.push_log("first?", "one");
        session.push_log("second?", "two");
        assert_eq!(session.log[0].sub_answer, "one");
        let json = session.log_json();
        assert!(json.find("first?").unwrap() < json.find("second?").unwrap());
    }
}
