//! Extraction prompt templates and the delimiter-separated record format.

use quarry_core::Language;

/// Separates fields inside one record.
pub const TUPLE_DELIMITER: &str = "<|>";
/// Separates records in the model output.
pub const RECORD_DELIMITER: &str = "##";
/// Marks the end of the record list.
pub const COMPLETION_DELIMITER: &str = "<|COMPLETE|>";

/// Entity types offered to the extraction model.
pub const DEFAULT_ENTITY_TYPES: &[&str] = &[
    "concept",
    "date",
    "location",
    "keyword",
    "organization",
    "person",
    "event",
    "work",
    "nature",
    "artificial",
    "science",
    "technology",
    "mission",
];

/// Main extraction prompt for one chunk of text.
pub fn entity_extraction(language: Language, entity_types: &[String], input_text: &str) -> String {
    let types = entity_types.join(",");
    match language {
        Language::En => format!(
            r#"You are an NLP expert, skilled at analyzing text to extract named entities and their relationships.

-Goal-
Given a text document and a list of entity types, identify all entities of those types and all relationships among them.

-Steps-
1. Identify all entities. For each, extract:
- entity_name: name of the entity, capitalized
- entity_type: one of: [{types}]
- entity_summary: comprehensive summary of the entity's attributes and activities
Format each entity as ("entity"{tuple}<entity_name>{tuple}<entity_type>{tuple}<entity_summary>)

2. From the entities in step 1, identify all pairs of (source_entity, target_entity) that are *clearly related*. For each pair extract:
- source_entity, target_entity: names as identified in step 1
- relationship_summary: why the source and target are related
- relationship_keywords: high-level keywords summarizing the nature of the relationship
- relationship_strength: a numeric score for the strength of the relationship
Format each relationship as ("relationship"{tuple}<source_entity>{tuple}<target_entity>{tuple}<relationship_summary>{tuple}<relationship_keywords>{tuple}<relationship_strength>)

3. Return all entities and relationships as a single list. Use **{record}** as the list delimiter.

4. When finished, output {completion}

-Example-
Text:
#############
Aspirin is widely used to treat fever. It was first isolated by Felix Hoffmann at Bayer.
#############
Output:
("entity"{tuple}"Aspirin"{tuple}"science"{tuple}"Aspirin is a medication used to treat fever and pain."){record}
("entity"{tuple}"Felix Hoffmann"{tuple}"person"{tuple}"Felix Hoffmann was a chemist who first isolated aspirin at Bayer."){record}
("entity"{tuple}"Bayer"{tuple}"organization"{tuple}"Bayer is the company where aspirin was first isolated."){record}
("relationship"{tuple}"Aspirin"{tuple}"Felix Hoffmann"{tuple}"Felix Hoffmann first isolated aspirin."{tuple}"discovery, chemistry"{tuple}9){record}
("relationship"{tuple}"Felix Hoffmann"{tuple}"Bayer"{tuple}"Felix Hoffmann worked at Bayer."{tuple}"employment"{tuple}8){completion}

-Real Data-
Text:
#############
{input}
#############
Output:
"#,
            types = types,
            tuple = TUPLE_DELIMITER,
            record = RECORD_DELIMITER,
            completion = COMPLETION_DELIMITER,
            input = input_text,
        ),
        Language::ZhCn => format!(
            r#"你是一个NLP专家，擅长分析文本提取命名实体和关系。

**步骤**
1. 识别所有实体，提取 entity_name（首字母大写）、entity_type（以下之一：[{types}]）、entity_summary（实体属性与活动的全面总结）。
   每个实体格式化为 ("entity"{tuple}<entity_name>{tuple}<entity_type>{tuple}<entity_summary>)
2. 识别所有明显相关的（源实体，目标实体）对，提取 relationship_summary、relationship_keywords、relationship_strength。
   每个关系格式化为 ("relationship"{tuple}<source_entity>{tuple}<target_entity>{tuple}<relationship_summary>{tuple}<relationship_keywords>{tuple}<relationship_strength>)
3. 以单个列表返回全部实体和关系，使用 **{record}** 作为列表分隔符。
4. 完成后输出 {completion}

**真实数据**
文本：
#############
{input}
#############
输出：
"#,
            types = types,
            tuple = TUPLE_DELIMITER,
            record = RECORD_DELIMITER,
            completion = COMPLETION_DELIMITER,
            input = input_text,
        ),
    }
}

/// Gleaning continuation: ask for entities missed in the previous turn.
pub fn continue_extraction(language: Language) -> &'static str {
    match language {
        Language::En => {
            "MANY entities were missed in the last extraction. Add them below using the same format:"
        }
        Language::ZhCn => "上次提取遗漏了很多实体。请使用相同格式在下面补充：",
    }
}

/// Gleaning gate: does another round look worthwhile?
pub fn if_loop_extraction(language: Language) -> &'static str {
    match language {
        Language::En => {
            "It appears some entities may have still been missed. Answer YES | NO if there are still entities that need to be added."
        }
        Language::ZhCn => "似乎仍有实体被遗漏。如果仍有需要补充的实体，回答 YES，否则回答 NO。",
    }
}

/// Condense an over-long merged description list into one summary.
pub fn summarize_descriptions(
    language: Language,
    entity_name: &str,
    descriptions: &[&str],
) -> String {
    let list = descriptions.join("\n");
    match language {
        Language::En => format!(
            r#"You are a helpful assistant responsible for generating a comprehensive summary of the data below.
Given one entity and a list of descriptions, all related to the same entity, concatenate them into a single, comprehensive description. Resolve any contradictions and write in third person, mentioning the entity name for full context.

Entity: {entity_name}
Description list:
{list}
Output:
"#,
        ),
        Language::ZhCn => format!(
            "给定一个实体以及与之相关的描述列表，请将它们合并为一段全面的描述，消除矛盾，使用第三人称并提及实体名称。\n\n实体：{entity_name}\n描述列表：\n{list}\n输出：\n",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_carries_delimiters_and_input() {
        let types: Vec<String> = DEFAULT_ENTITY_TYPES.iter().map(|s| s.to_string()).collect();
        let p = entity_extraction(Language::En, &types, "some document text");
        assert!(p.contains("some document text"));
        assert!(p.contains(TUPLE_DELIMITER));
        assert!(p.contains(RECORD_DELIMITER));
        assert!(p.contains(COMPLETION_DELIMITER));
    }
}
