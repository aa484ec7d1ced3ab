//! The reasoning engine: parse a question into a logic-form plan, execute
//! it step by step, collect provenance-linked evidence.

use crate::knowledge::CHUNK_DB_DIR;
use crate::logic::{parse_action, LogicNode, NodeMeta, PlanExecutor, ReasoningSession};
use crate::{prompts, Evidence, RetrieveError, RetrieveResource, RetrieveResult, Retriever};
use async_trait::async_trait;
use quarry_core::Query;
use quarry_extract::KnowledgeIndexes;
use quarry_index::ChunkStore;
use quarry_llm::ChatRequest;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct PlanStep {
    step: String,
    action: String,
}

/// Parse the model's plan reply into ordered logic nodes.
fn parse_plan(question: &str, reply: &str) -> RetrieveResult<Vec<LogicNode>> {
    // tolerate prose or code fences around the JSON list
    let start = reply
        .find('[')
        .ok_or_else(|| RetrieveError::PlanParse(format!("no JSON list in '{reply}'")))?;
    let end = reply
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| RetrieveError::PlanParse(format!("unterminated JSON list in '{reply}'")))?;

    let steps: Vec<PlanStep> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| RetrieveError::PlanParse(e.to_string()))?;

    let mut nodes = Vec::with_capacity(steps.len());
    for step in steps {
        let meta = NodeMeta {
            sub_query: step.step,
            root_query: question.to_string(),
        };
        nodes.push(parse_action(&step.action, meta)?);
    }
    Ok(nodes)
}

/// Multi-hop retriever executing logic-form plans against the graph.
pub struct ReasonRetriever {
    resource: RetrieveResource,
    indexes: KnowledgeIndexes,
    chunk_store: ChunkStore,
    dense_threshold: f32,
}

impl ReasonRetriever {
    /// Load indexes and chunk store from a work directory.
    pub fn open(resource: RetrieveResource, work_dir: &Path) -> RetrieveResult<Self> {
        if !work_dir.exists() {
            warn!(path = %work_dir.display(), "work dir does not exist, indexes will be empty");
        }
        let indexes = KnowledgeIndexes::load(work_dir)?;
        let chunk_store = ChunkStore::open(work_dir.join(CHUNK_DB_DIR))?;
        Ok(Self::with_components(resource, indexes, chunk_store))
    }

    /// Assemble from already-loaded components.
    pub fn with_components(
        resource: RetrieveResource,
        indexes: KnowledgeIndexes,
        chunk_store: ChunkStore,
    ) -> Self {
        Self {
            resource,
            indexes,
            chunk_store,
            dense_threshold: 0.2,
        }
    }
}

#[async_trait]
impl Retriever for ReasonRetriever {
    async fn explore(&self, query: &Query) -> RetrieveResult<Evidence> {
        let prompt = prompts::plan(query.language, &query.text);
        let reply = self.resource.llm.chat(ChatRequest::new(prompt)).await?;
        debug!(reply = %reply, "logic-form plan");

        let nodes = parse_plan(&query.text, &reply)?;
        let executor = PlanExecutor::new(
            &self.resource,
            &self.indexes.entity,
            &self.indexes.relation,
            &self.chunk_store,
            self.dense_threshold,
            query.language,
        );
        let mut session = ReasoningSession::new();
        executor.execute(&nodes, &mut session).await?;
        session.into_evidence(&self.chunk_store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_parses_with_surrounding_prose() {
        let reply = r#"Here is the plan:
[
  {"step": "Query the relation", "action": "get_spo(s=s1:rice[Huangfengzhan], p=p1:parent, o=o1:rice[Fengxiuzhan])"},
  {"step": "Return it", "action": "get(p1)"}
]
Done."#;
        let nodes = parse_plan("question", reply).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].meta().root_query, "question");
        assert_eq!(nodes[1].meta().sub_query, "Return it");
    }

    #[test]
    fn unparsable_plan_is_an_error() {
        assert!(matches!(
            parse_plan("q", "no list here"),
            Err(RetrieveError::PlanParse(_))
        ));
        assert!(matches!(
            parse_plan("q", "[{\"step\": \"x\", \"action\": \"teleport(y)\"}]"),
            Err(RetrieveError::PlanParse(_))
        ));
    }
}
