//! The uniform result envelope every retrieval strategy returns.

use crate::prompts;
use quarry_core::{Chunk, Language};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One step of the reasoning log: what was asked, what was concluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQa {
    pub sub_query: String,
    pub sub_answer: String,
}

/// Ranked, provenance-tagged evidence for one query.
///
/// `entity_rows` are `(name, type, description, degree)` tuples;
/// `relation_rows` are `(source, target, description, keywords, weight,
/// degree)`. Every chunk in `source_chunks` is traceable through its hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub entity_rows: Vec<Vec<String>>,
    pub relation_rows: Vec<Vec<String>>,
    pub source_chunks: Vec<Chunk>,
    pub sub_qa: Vec<SubQa>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_rows.is_empty()
            && self.relation_rows.is_empty()
            && self.source_chunks.is_empty()
            && self.sub_qa.is_empty()
    }

    pub fn add_source(&mut self, chunk: Chunk) {
        self.source_chunks.push(chunk);
    }

    /// Union two evidence sets, keeping `self` first and dropping
    /// duplicates: entities by name, relations by endpoint pair, chunks by
    /// hash.
    pub fn combine(mut self, other: Evidence) -> Evidence {
        let mut entity_keys: HashSet<String> = self
            .entity_rows
            .iter()
            .filter_map(|r| r.first().cloned())
            .collect();
        for row in other.entity_rows {
            let Some(key) = row.first().cloned() else {
                continue;
            };
            if entity_keys.insert(key) {
                self.entity_rows.push(row);
            }
        }

        let mut relation_keys: HashSet<(String, String)> = self
            .relation_rows
            .iter()
            .filter_map(|r| match (r.first(), r.get(1)) {
                (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                _ => None,
            })
            .collect();
        for row in other.relation_rows {
            let (Some(a), Some(b)) = (row.first(), row.get(1)) else {
                continue;
            };
            if relation_keys.insert((a.clone(), b.clone())) {
                self.relation_rows.push(row);
            }
        }

        let mut chunk_keys: HashSet<String> =
            self.source_chunks.iter().map(|c| c.hash.clone()).collect();
        for chunk in other.source_chunks {
            if chunk_keys.insert(chunk.hash.clone()) {
                self.source_chunks.push(chunk);
            }
        }

        self.sub_qa.extend(other.sub_qa);
        self
    }

    /// Render tables, sources and the step log into one prompt-ready
    /// block.
    pub fn render(&self, query: &str, language: Language) -> String {
        let entities = to_csv(
            &["entity", "type", "description", "rank"],
            &self.entity_rows,
        );
        let relations = to_csv(
            &["source", "target", "description", "keywords", "weight", "rank"],
            &self.relation_rows,
        );

        let source_rows: Vec<Vec<String>> = self
            .source_chunks
            .iter()
            .map(|c| {
                let reference = c
                    .meta_str("source")
                    .map(|s| s.rsplit('/').next().unwrap_or(s).to_string())
                    .unwrap_or_else(|| c.hash.clone());
                vec![reference, c.content.clone()]
            })
            .collect();
        let search_text = to_csv(&["reference", "content"], &source_rows);

        let step_text = serde_json::to_string(&self.sub_qa).unwrap_or_default();
        prompts::generate(language, &entities, &relations, &search_text, &step_text, query)
    }
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn to_csv(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&header.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(","));
    out.push('\n');
    for row in rows {
        out.push_str(&row.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(","));
        out.push('\n');
    }
    out
}
