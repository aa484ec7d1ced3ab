//! Merge algebra for duplicate entities and relations.
//!
//! Merges are pure and order-independent: types are voted by frequency,
//! description fragments are unioned and sorted before joining, source ids
//! are unioned, weights are summed. The LM condensation of over-long
//! descriptions happens in the pipeline, after the pure merge.

use crate::records::{RawEntity, RawRelation};
use quarry_core::{Edge, Vertex, GRAPH_FIELD_SEP};
use std::collections::{BTreeMap, BTreeSet};

fn fragments(description: &str) -> BTreeSet<String> {
    description
        .split(GRAPH_FIELD_SEP)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn vote_type<'a>(candidates: impl Iterator<Item = &'a str>) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for t in candidates {
        if !t.is_empty() {
            *counts.entry(t).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(t, _)| t.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Merge entity occurrences with an optional pre-existing vertex.
pub fn merge_entity(name: &str, records: &[RawEntity], existing: Option<&Vertex>) -> Vertex {
    let mut descs: BTreeSet<String> = BTreeSet::new();
    let mut sources: BTreeSet<String> = BTreeSet::new();
    let mut types: Vec<&str> = Vec::new();

    if let Some(v) = existing {
        descs.extend(fragments(&v.description));
        sources.extend(v.source_ids.iter().cloned());
        types.push(v.entity_type.as_str());
    }
    for r in records {
        descs.extend(fragments(&r.description));
        sources.insert(r.source_id.clone());
        types.push(r.entity_type.as_str());
    }

    Vertex {
        name: name.to_string(),
        entity_type: vote_type(types.into_iter()),
        description: descs.into_iter().collect::<Vec<_>>().join(GRAPH_FIELD_SEP),
        source_ids: sources,
        community_id: existing.and_then(|v| v.community_id.clone()),
    }
}

/// Merge relation occurrences with an optional pre-existing edge.
pub fn merge_relation(
    src: &str,
    tgt: &str,
    records: &[RawRelation],
    existing: Option<&Edge>,
) -> Edge {
    let mut descs: BTreeSet<String> = BTreeSet::new();
    let mut keywords: BTreeSet<String> = BTreeSet::new();
    let mut sources: BTreeSet<String> = BTreeSet::new();
    let mut weight = 0.0;

    if let Some(e) = existing {
        descs.extend(fragments(&e.description));
        keywords.extend(fragments(&e.keywords));
        sources.extend(e.source_ids.iter().cloned());
        weight += e.weight;
    }
    for r in records {
        descs.extend(fragments(&r.description));
        keywords.extend(fragments(&r.keywords));
        sources.insert(r.source_id.clone());
        weight += r.weight;
    }

    Edge {
        src: src.to_string(),
        tgt: tgt.to_string(),
        keywords: keywords.into_iter().collect::<Vec<_>>().join(GRAPH_FIELD_SEP),
        description: descs.into_iter().collect::<Vec<_>>().join(GRAPH_FIELD_SEP),
        weight,
        source_ids: sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, ty: &str, desc: &str, source: &str) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            entity_type: ty.to_string(),
            description: desc.to_string(),
            source_id: source.to_string(),
        }
    }

    fn relation(desc: &str, kw: &str, weight: f64, source: &str) -> RawRelation {
        RawRelation {
            src: "A".to_string(),
            tgt: "B".to_string(),
            description: desc.to_string(),
            keywords: kw.to_string(),
            weight,
            source_id: source.to_string(),
        }
    }

    #[test]
    fn type_vote_by_frequency() {
        let records = vec![
            entity("RICE", "PLANT", "a", "h1"),
            entity("RICE", "PLANT", "b", "h2"),
            entity("RICE", "FOOD", "c", "h3"),
        ];
        let merged = merge_entity("RICE", &records, None);
        assert_eq!(merged.entity_type, "PLANT");
        assert_eq!(merged.source_ids.len(), 3);
    }

    #[test]
    fn incremental_merge_equals_batch_merge() {
        let a = entity("RICE", "PLANT", "desc a", "h1");
        let b = entity("RICE", "PLANT", "desc b", "h2");
        let c = entity("RICE", "FOOD", "desc c", "h3");

        // merge [a, b] then fold in [c]
        let first = merge_entity("RICE", &[a.clone(), b.clone()], None);
        let stepwise = merge_entity("RICE", &[c.clone()], Some(&first));

        // merge [a, b, c] at once
        let batch = merge_entity("RICE", &[a, b, c], None);

        assert_eq!(stepwise.description, batch.description);
        assert_eq!(stepwise.source_ids, batch.source_ids);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = entity("RICE", "PLANT", "desc a", "h1");
        let once = merge_entity("RICE", &[a.clone()], None);
        let twice = merge_entity("RICE", &[a], Some(&once));
        assert_eq!(once.description, twice.description);
        assert_eq!(once.source_ids, twice.source_ids);
    }

    #[test]
    fn relation_weights_sum() {
        let r1 = relation("first", "treats", 2.0, "h1");
        let r2 = relation("second", "cures", 3.0, "h2");
        let merged = merge_relation("A", "B", &[r1, r2], None);
        assert!((merged.weight - 5.0).abs() < f64::EPSILON);
        assert!(merged.keywords.contains("treats"));
        assert!(merged.keywords.contains("cures"));
        assert_eq!(merged.source_ids.len(), 2);

        let more = merge_relation("A", "B", &[relation("third", "helps", 1.0, "h3")], Some(&merged));
        assert!((more.weight - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_descriptions_dedup() {
        let r1 = entity("X", "T", "same", "h1");
        let r2 = entity("X", "T", "same", "h2");
        let merged = merge_entity("X", &[r1, r2], None);
        assert_eq!(merged.description, "same");
    }
}
