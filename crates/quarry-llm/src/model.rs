//! The language model trait and chat request types.

use crate::LlmResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat call: prompt plus optional system prompt and prior turns.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub history: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub timeout_secs: u32,
    /// Permit silently truncating an over-long prompt instead of failing.
    pub allow_truncate: bool,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            history: Vec::new(),
            max_tokens: 1024,
            timeout_secs: 600,
            allow_truncate: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn allow_truncate(mut self) -> Self {
        self.allow_truncate = true;
        self
    }
}

/// A chat-capable language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name, used as the cache key component.
    fn name(&self) -> &str;

    /// Complete a chat request, returning the full reply text.
    async fn chat(&self, request: ChatRequest) -> LlmResult<String>;

    /// Streaming variant. The default completes the request and delivers
    /// the whole reply as one piece.
    async fn chat_stream(&self, request: ChatRequest) -> LlmResult<mpsc::Receiver<String>> {
        let text = self.chat(request).await?;
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let _ = tx.send(text).await;
        });
        Ok(rx)
    }
}
