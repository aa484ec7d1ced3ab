//! Parsing the delimiter-separated extraction records.

use crate::prompts::{COMPLETION_DELIMITER, RECORD_DELIMITER, TUPLE_DELIMITER};
use quarry_core::text::{clean_str, is_float_str, split_by_markers};
use std::collections::HashMap;
use tracing::debug;

/// Names longer than this are dropped at parse time. Inherited from the
/// original pipeline; see DESIGN.md for the decision to keep it.
pub const ENTITY_MAX_LENGTH: usize = 64;

/// One entity occurrence extracted from a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity {
    pub name: String,
    pub entity_type: String,
    pub description: String,
    /// Hash of the chunk this record came from.
    pub source_id: String,
}

/// One relation occurrence extracted from a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelation {
    pub src: String,
    pub tgt: String,
    pub description: String,
    pub keywords: String,
    pub weight: f64,
    pub source_id: String,
}

fn parse_entity_record(attrs: &[String], chunk_hash: &str) -> Option<RawEntity> {
    if attrs.len() < 4 || attrs[0] != "\"entity\"" {
        return None;
    }
    let name = clean_str(&attrs[1]).to_uppercase();
    if name.is_empty() {
        return None;
    }
    if name.chars().count() > ENTITY_MAX_LENGTH {
        debug!(entity = %name, "dropping over-length entity name");
        return None;
    }
    Some(RawEntity {
        name,
        entity_type: clean_str(&attrs[2]).to_uppercase(),
        description: clean_str(&attrs[3]),
        source_id: chunk_hash.to_string(),
    })
}

fn parse_relation_record(attrs: &[String], chunk_hash: &str) -> Option<RawRelation> {
    if attrs.len() < 5 || attrs[0] != "\"relationship\"" {
        return None;
    }
    let src = clean_str(&attrs[1]).to_uppercase();
    let tgt = clean_str(&attrs[2]).to_uppercase();
    let description = clean_str(&attrs[3]);
    let keywords = clean_str(&attrs[4]);
    if description.is_empty() || keywords.is_empty() {
        return None;
    }
    if src.chars().count() > ENTITY_MAX_LENGTH || tgt.chars().count() > ENTITY_MAX_LENGTH {
        debug!(src = %src, tgt = %tgt, "dropping relation with over-length endpoint");
        return None;
    }
    let last = attrs.last().map(|s| s.as_str()).unwrap_or("");
    let weight = if is_float_str(last) {
        last.trim().parse().unwrap_or(1.0)
    } else {
        1.0
    };
    Some(RawRelation {
        src,
        tgt,
        description,
        keywords,
        weight,
        source_id: chunk_hash.to_string(),
    })
}

/// Entities keyed by name and relations keyed by endpoint pair, parsed
/// from one model reply. Malformed records are skipped.
pub fn parse_extraction_output(
    output: &str,
    chunk_hash: &str,
) -> (
    HashMap<String, Vec<RawEntity>>,
    HashMap<(String, String), Vec<RawRelation>>,
) {
    let mut entities: HashMap<String, Vec<RawEntity>> = HashMap::new();
    let mut relations: HashMap<(String, String), Vec<RawRelation>> = HashMap::new();

    let records = split_by_markers(output, &[RECORD_DELIMITER, COMPLETION_DELIMITER]);
    for record in records {
        // records are wrapped in parentheses
        let Some(open) = record.find('(') else {
            continue;
        };
        let Some(close) = record.rfind(')') else {
            continue;
        };
        if close <= open {
            continue;
        }
        let inner = &record[open + 1..close];
        let attrs = split_by_markers(inner, &[TUPLE_DELIMITER]);

        if let Some(entity) = parse_entity_record(&attrs, chunk_hash) {
            entities.entry(entity.name.clone()).or_default().push(entity);
            continue;
        }
        if let Some(relation) = parse_relation_record(&attrs, chunk_hash) {
            relations
                .entry((relation.src.clone(), relation.tgt.clone()))
                .or_default()
                .push(relation);
        }
    }
    (entities, relations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output() -> String {
        format!(
            "(\"entity\"{t}\"Aspirin\"{t}\"science\"{t}\"A fever medication.\"){r}\
             (\"entity\"{t}\"Bayer\"{t}\"organization\"{t}\"A pharma company.\"){r}\
             (\"relationship\"{t}\"Aspirin\"{t}\"Bayer\"{t}\"Isolated at Bayer.\"{t}\"discovery\"{t}9){c}",
            t = TUPLE_DELIMITER,
            r = RECORD_DELIMITER,
            c = COMPLETION_DELIMITER,
        )
    }

    #[test]
    fn parses_entities_and_relations() {
        let (entities, relations) = parse_extraction_output(&sample_output(), "h1");
        assert_eq!(entities.len(), 2);
        assert!(entities.contains_key("ASPIRIN"));
        let aspirin = &entities["ASPIRIN"][0];
        assert_eq!(aspirin.entity_type, "SCIENCE");
        assert_eq!(aspirin.source_id, "h1");

        assert_eq!(relations.len(), 1);
        let rel = &relations[&("ASPIRIN".to_string(), "BAYER".to_string())][0];
        assert_eq!(rel.keywords, "discovery");
        assert!((rel.weight - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let text = format!(
            "garbage{r}(\"entity\"{t}\"OK\"{t}\"concept\"{t}\"fine\"){r}(\"entity\"{t}\"\")",
            t = TUPLE_DELIMITER,
            r = RECORD_DELIMITER
        );
        let (entities, relations) = parse_extraction_output(&text, "h");
        assert_eq!(entities.len(), 1);
        assert!(relations.is_empty());
    }

    #[test]
    fn over_length_names_are_dropped() {
        let long_name = "X".repeat(ENTITY_MAX_LENGTH + 1);
        let text = format!(
            "(\"entity\"{t}\"{n}\"{t}\"concept\"{t}\"desc\")",
            t = TUPLE_DELIMITER,
            n = long_name
        );
        let (entities, _) = parse_extraction_output(&text, "h");
        assert!(entities.is_empty());
    }

    #[test]
    fn missing_weight_defaults_to_one() {
        let text = format!(
            "(\"relationship\"{t}\"A\"{t}\"B\"{t}\"related\"{t}\"link\")",
            t = TUPLE_DELIMITER
        );
        let (_, relations) = parse_extraction_output(&text, "h");
        let rel = &relations[&("A".to_string(), "B".to_string())][0];
        assert!((rel.weight - 1.0).abs() < f64::EPSILON);
    }
}
