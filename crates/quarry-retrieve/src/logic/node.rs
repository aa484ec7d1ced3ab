//! Parsing one action line into a typed logic node.

use crate::{RetrieveError, RetrieveResult};
use std::fmt;

/// Question context carried by every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMeta {
    /// The sub-question this step answers.
    pub sub_query: String,
    /// The original user question.
    pub root_query: String,
}

/// `alias:type[name]` — the name is present only when the plan queries a
/// concrete entity; a bare alias refers to an earlier step's binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRef {
    pub alias: String,
    pub entity_type: Option<String>,
    pub name: Option<String>,
}

impl EntityRef {
    fn parse(input: &str) -> Self {
        let input = input.trim();
        let (head, name) = match input.find('[') {
            Some(open) => {
                let close = input.rfind(']').unwrap_or(input.len());
                let name = input[open + 1..close.min(input.len())]
                    .trim()
                    .trim_matches('`')
                    .to_string();
                (
                    &input[..open],
                    if name.is_empty() { None } else { Some(name) },
                )
            }
            None => (input, None),
        };
        let (alias, entity_type) = match head.split_once(':') {
            Some((a, t)) => {
                let t = t.trim();
                (
                    a.trim().to_string(),
                    if t.is_empty() {
                        None
                    } else {
                        Some(t.to_string())
                    },
                )
            }
            None => (head.trim().to_string(), None),
        };
        Self {
            alias,
            entity_type,
            name,
        }
    }
}

/// `alias:relation_type` — the type is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationRef {
    pub alias: String,
    pub rel_type: Option<String>,
}

impl RelationRef {
    fn parse(input: &str) -> Self {
        match input.trim().split_once(':') {
            Some((a, t)) => {
                let t = t.trim();
                Self {
                    alias: a.trim().to_string(),
                    rel_type: if t.is_empty() {
                        None
                    } else {
                        Some(t.to_string())
                    },
                }
            }
            None => Self {
                alias: input.trim().to_string(),
                rel_type: None,
            },
        }
    }
}

/// One step of a logic-form plan.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicNode {
    /// Triple query against the graph.
    GetSpo {
        s: EntityRef,
        p: RelationRef,
        o: EntityRef,
        meta: NodeMeta,
    },
    /// Count the items named by the set, binding the result alias.
    Count {
        set: Vec<String>,
        alias: String,
        meta: NodeMeta,
    },
    /// Accumulate the values named by the set, binding the result alias.
    Sum {
        set: Vec<String>,
        alias: String,
        meta: NodeMeta,
    },
    /// Compare the values named by the set. Informational: the result is
    /// recorded but never gates execution.
    Compare {
        set: Vec<String>,
        op: String,
        meta: NodeMeta,
    },
    /// Select which aliases' evidence the final reply surfaces.
    Output { aliases: Vec<String>, meta: NodeMeta },
}

impl LogicNode {
    pub fn meta(&self) -> &NodeMeta {
        match self {
            LogicNode::GetSpo { meta, .. }
            | LogicNode::Count { meta, .. }
            | LogicNode::Sum { meta, .. }
            | LogicNode::Compare { meta, .. }
            | LogicNode::Output { meta, .. } => meta,
        }
    }
}

impl fmt::Display for LogicNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicNode::GetSpo { s, p, o, .. } => {
                write!(f, "get_spo(s={}, p={}, o={})", s.alias, p.alias, o.alias)
            }
            LogicNode::Count { set, alias, .. } => {
                write!(f, "count({})->{}", set.join(","), alias)
            }
            LogicNode::Sum { set, alias, .. } => {
                write!(f, "sum({})->{}", set.join(","), alias)
            }
            LogicNode::Compare { set, op, .. } => {
                write!(f, "compare(set=[{}], op={})", set.join(","), op)
            }
            LogicNode::Output { aliases, .. } => write!(f, "get({})", aliases.join(",")),
        }
    }
}

/// Group comma-separated pieces into `key=value` params, where only the
/// listed keys start a new param (values may themselves contain commas).
fn split_params<'a>(args: &'a str, keys: &[&str]) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();
    for piece in args.split(',') {
        let trimmed = piece.trim_start();
        let starts_param = keys.iter().any(|k| {
            trimmed
                .strip_prefix(k)
                .map(|rest| rest.trim_start().starts_with('='))
                .unwrap_or(false)
        });
        if starts_param {
            if let Some((key, value)) = piece.split_once('=') {
                params.push((key.trim().to_string(), value.trim().to_string()));
                continue;
            }
        }
        if let Some(last) = params.last_mut() {
            last.1.push(',');
            last.1.push_str(piece);
        }
    }
    params
}

fn parse_get_spo(args: &str, meta: NodeMeta) -> RetrieveResult<LogicNode> {
    let mut s = None;
    let mut p = None;
    let mut o = None;
    for (key, value) in split_params(args, &["s", "p", "o"]) {
        match key.as_str() {
            "s" => s = Some(EntityRef::parse(&value)),
            "p" => p = Some(RelationRef::parse(&value)),
            "o" => o = Some(EntityRef::parse(&value)),
            _ => {}
        }
    }
    match (s, p, o) {
        (Some(s), Some(p), Some(o)) => Ok(LogicNode::GetSpo { s, p, o, meta }),
        _ => Err(RetrieveError::PlanParse(format!(
            "get_spo missing s, p or o in '{args}'"
        ))),
    }
}

fn parse_compare(args: &str, meta: NodeMeta) -> RetrieveResult<LogicNode> {
    let mut set = Vec::new();
    let mut op = String::new();
    for (key, value) in split_params(args, &["set", "op"]) {
        match key.as_str() {
            "set" => {
                set = value
                    .trim()
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "op" => op = value.trim().to_string(),
            _ => {}
        }
    }
    if set.is_empty() || op.is_empty() {
        return Err(RetrieveError::PlanParse(format!(
            "compare missing set or op in '{args}'"
        )));
    }
    Ok(LogicNode::Compare { set, op, meta })
}

fn split_set(args: &str) -> Vec<String> {
    args.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse one `op(args)[->output]` action line.
pub fn parse_action(action: &str, meta: NodeMeta) -> RetrieveResult<LogicNode> {
    let action = action.trim();
    let open = action
        .find('(')
        .ok_or_else(|| RetrieveError::PlanParse(format!("no '(' in '{action}'")))?;
    let close = action
        .rfind(')')
        .ok_or_else(|| RetrieveError::PlanParse(format!("no ')' in '{action}'")))?;
    if close < open {
        return Err(RetrieveError::PlanParse(format!("malformed '{action}'")));
    }
    let op = action[..open].trim().to_lowercase();
    let args = &action[open + 1..close];
    let output = action[close + 1..]
        .trim()
        .strip_prefix("->")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match op.as_str() {
        "get" => Ok(LogicNode::Output {
            aliases: split_set(args),
            meta,
        }),
        "get_spo" | "retrieval" => parse_get_spo(args, meta),
        "count" => Ok(LogicNode::Count {
            set: split_set(args),
            alias: output.unwrap_or_else(|| "count1".to_string()),
            meta,
        }),
        "sum" => Ok(LogicNode::Sum {
            set: split_set(args),
            alias: output.unwrap_or_else(|| "sum1".to_string()),
            meta,
        }),
        "compare" => parse_compare(args, meta),
        other => Err(RetrieveError::PlanParse(format!(
            "unknown operator '{other}'"
        ))),
    }
}
