//! Prompt templates for retrieval and reasoning.

use quarry_core::Language;

/// Split a query into high-level and low-level keyword sets.
pub fn keywords_extraction(language: Language, query: &str) -> String {
    match language {
        Language::En => format!(
            r#"You are an NLP expert, skilled in identifying high-level and low-level keywords in user queries.

## Task
Based on the query, list high-level and low-level keywords. High-level keywords focus on overall concepts or themes, while low-level keywords focus on specific entities, details, or specific terms.

## Output Format Requirements
- Output the keywords in JSON format.
- The JSON should have two keys:
  - "high_level_keywords" for overall concepts or themes.
  - "low_level_keywords" for specific entities or details.

## Example
Query:
```text
How does international trade affect global economic stability?
```
Output:
{{
  "high_level_keywords": ["international trade", "global economic stability", "economic impact"],
  "low_level_keywords": ["trade agreements", "tariffs", "currency exchange", "imports", "exports"]
}}

## Query
```text
{query}
```
Output:
"#,
        ),
        Language::ZhCn => format!(
            r#"你是一位NLP专家，擅长识别用户查询中的高级和低级关键词。

## 任务
根据查询，列出高级和低级关键词。高级关键词关注总体概念或主题，低级关键词关注具体实体、细节或具体术语。

## 输出格式要求
- 以JSON格式输出关键词，包含 "high_level_keywords" 和 "low_level_keywords" 两个键。

## 查询
```text
{query}
```
输出：
"#,
        ),
    }
}

/// Decompose a question into an ordered list of logic-form steps.
/// One template serves both languages; plans come back in the
/// question's language either way.
pub fn plan(_language: Language, input_text: &str) -> String {
    format!(
        r#"You are a programmer. Read the function descriptions and the user input, decompose the input into sub-questions, and answer each sub-question by calling one function.

## function list
[
{{
    "functionName": "get_spo",
    "function_declaration": "get_spo(s=s_alias:entity_type[entity_name], p=p_alias:edge_type, o=o_alias:entity_type[entity_name])",
    "description": "Query spo facts. s is the subject and o the object, written as alias:entity_type[entity_name]; entity_name is optional and given only when a concrete entity is queried. p is the predicate (relation or attribute), written as alias:edge_type. Every variable gets an alias for later reference. When a variable refers to an earlier alias, give only that alias; all three of s, p, o must be present."
}},
{{
    "functionName": "count",
    "function_declaration": "count(alias)->count_alias",
    "description": "Count nodes. The argument is an alias introduced by get_spo; count_alias names the integer result for later reference."
}},
{{
    "functionName": "sum",
    "function_declaration": "sum(alias, num1, num2, ...)->sum_alias",
    "description": "Add values: numbers or aliases bound earlier; sum_alias names the numeric result for later reference."
}},
{{
    "functionName": "compare",
    "function_declaration": "compare(set=[alias], op=equal or not_equal or bigger or small)",
    "description": "Compare two or more values. set lists aliases or constants; op is the comparison."
}},
{{
    "functionName": "get",
    "function_declaration": "get(alias)",
    "description": "Return the information named by the alias: an entity, a relation path, or an attribute value obtained by get_spo. Used as the final output."
}}
]

## Output requirements
- Output a JSON list; every element has "step" (sub-question text) and "action" (one function call).
- One function per sub-question; never nest one function inside another.
- Decompose only; do not answer the question itself.

## Example
[
{{
    "query": "What is the parent relation between Huangfengzhan and Fengxiuzhan?",
    "answer": [{{"step":"Query the parent relation","action":"get_spo(s=s1:rice[Huangfengzhan], p=p1:parent relation, o=o1:rice[Fengxiuzhan])"}},{{"step":"Return the relation","action":"get(p1)"}}]
}}
]

## User input
{input_text}
"#,
    )
}

/// Answer a sub-question from reference chunks and earlier steps.
pub fn naive_qa(
    language: Language,
    references: &str,
    root_query: &str,
    step_text: &str,
    sub_query: &str,
) -> String {
    match language {
        Language::En => format!(
            r#"## Task
Read the reference documents carefully and answer the sub-question.

## Notes
- The sub-question was decomposed from the original question; answer only the sub-question.
- If you don't know the answer, or the references do not contain enough information, reply "cannot determine". Do not make anything up.

## References
{references}

## Original question
{root_query}

## Earlier steps
{step_text}

## Sub-question
{sub_query}
"#,
        ),
        Language::ZhCn => format!(
            "## 任务\n请仔细阅读参考文档，回答子问题。\n\n## 注意事项\n- 子问题由原始问题分解而来，只需回答子问题。\n- 如果你不知道答案，或参考资料信息不足，回复“无法确定”，不要编造。\n\n## 参考文档\n{references}\n\n## 原始问题\n{root_query}\n\n## 参考子步骤\n{step_text}\n\n## 子问题\n{sub_query}\n",
        ),
    }
}

/// Delegate an arithmetic operator to the model.
pub fn math(
    language: Language,
    task: &str,
    param_text: &str,
    root_query: &str,
    step_text: &str,
    sub_query: &str,
) -> String {
    match language {
        Language::En => format!(
            r#"You are a text and math expert, skilled at analyzing user input and logical reasoning. {task}

## Task
Read the parameter list carefully and answer the user input.

## Output requirements
- Explain the calculation.
- Be concise; no text unrelated to the instruction.
- If the input contains no numbers, give a sensible default.

## Notes
- Markup used for text control does not count as a number.

## Parameter list
{param_text}

## Original question
{root_query}

## Earlier steps
{step_text}

## User input
{sub_query}
"#,
        ),
        Language::ZhCn => format!(
            "你是一个文本专家和数学专家，擅长分析用户输入和逻辑推理。{task}\n\n## 参数列表\n{param_text}\n\n## 原始问题\n{root_query}\n\n## 参考子步骤\n{step_text}\n\n## 用户输入\n{sub_query}\n",
        ),
    }
}

/// Final prompt block: tables, sources and step log around the question.
pub fn generate(
    language: Language,
    entities: &str,
    relations: &str,
    search_text: &str,
    step_text: &str,
    input_text: &str,
) -> String {
    match language {
        Language::En => format!(
            r#"## Task
Please use entities, relationships and search results (some of which may be irrelevant) to answer user input.

## Output Format and Language Style Requirements
- Be concise; no text irrelevant to the user's instructions.
- If you don't know the answer or the provided knowledge does not contain sufficient information, just say so. Do not make anything up.

## Entities
{entities}

## Relationships
{relations}

## Search result
{search_text}

## Step
{step_text}

## User input
{input_text}
"#,
        ),
        Language::ZhCn => format!(
            "## 任务\n请根据实体列表、关系列表、检索结果（其中一些可能不相关）回答用户输入。\n\n## 输出要求\n- 简洁明了；如果信息不足，直接回复“无法确定”，不要编造。\n\n## 实体列表\n{entities}\n\n## 关系列表\n{relations}\n\n## 检索结果\n{search_text}\n\n## 参考子步骤\n{step_text}\n\n## 用户输入\n{input_text}\n",
        ),
    }
}

/// Operator intent lines for the math prompt.
pub fn math_task(language: Language, op: &str) -> String {
    match (language, op) {
        (Language::En, "count") => {
            "Execute the Count operator: count the items in the parameter list; the target may be numeric or textual.".to_string()
        }
        (Language::En, "sum") => {
            "Execute the Sum operator: accumulate the numeric values in the parameter list.".to_string()
        }
        (Language::En, "compare") => {
            "Execute the Compare operator: compare the magnitudes of the values in the parameter list.".to_string()
        }
        (Language::ZhCn, "count") => "执行 Count 算子，统计参数列表中的项目数量。".to_string(),
        (Language::ZhCn, "sum") => "执行 Sum 算子，完成参数列表中的数值累加。".to_string(),
        (Language::ZhCn, "compare") => "执行 Compare 算子，比较参数列表中数字大小。".to_string(),
        (_, other) => format!("Execute the {other} operator on the parameter list."),
    }
}
