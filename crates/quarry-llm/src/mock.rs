//! Mock model for tests.

use crate::{ChatRequest, LanguageModel, LlmResult};
use async_trait::async_trait;
use std::sync::Mutex;

/// Canned-response model: the first pattern contained in the prompt wins.
///
/// Records every prompt it sees so tests can assert on the call sequence.
pub struct MockModel {
    responses: Vec<(String, String)>,
    default: String,
    calls: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            default: String::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `response` whenever the prompt contains `pattern`.
    pub fn with_response(mut self, pattern: &str, response: &str) -> Self {
        self.responses
            .push((pattern.to_string(), response.to_string()));
        self
    }

    /// Reply for prompts matching no pattern.
    pub fn with_default(mut self, response: &str) -> Self {
        self.default = response.to_string();
        self
    }

    /// Number of chat calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Prompts seen so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: ChatRequest) -> LlmResult<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.prompt.clone());
        for (pattern, response) in &self.responses {
            if request.prompt.contains(pattern) {
                return Ok(response.clone());
            }
        }
        Ok(self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pattern_matching_and_logging() {
        let model = MockModel::new()
            .with_response("keywords", "{\"high_level_keywords\": []}")
            .with_default("fallback");

        let hit = model
            .chat(ChatRequest::new("extract keywords from this"))
            .await
            .unwrap();
        assert!(hit.contains("high_level_keywords"));

        let miss = model.chat(ChatRequest::new("other")).await.unwrap();
        assert_eq!(miss, "fallback");
        assert_eq!(model.call_count(), 2);
    }
}
