//! OpenAI-compatible chat backend.
//!
//! Covers every provider speaking the `/chat/completions` dialect; the
//! base-url table maps known provider names so configs can name a backend
//! without spelling out its endpoint.

use crate::{ChatMessage, ChatRequest, LanguageModel, LlmError, LlmResult, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Known provider base URLs.
fn base_url_for(name: &str) -> Option<&'static str> {
    match name {
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "kimi" => Some("https://api.moonshot.cn/v1"),
        "zhipuai" => Some("https://open.bigmodel.cn/api/paas/v4"),
        "siliconcloud" => Some("https://api.siliconflow.cn/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "local" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Provider name; doubles as the cache key component.
    pub name: String,
    /// Endpoint base; resolved from the provider table when empty.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl OpenAiConfig {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let name = name.into();
        let base_url = base_url_for(&name).unwrap_or_default().to_string();
        Self {
            name,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: String,
}

/// Backend speaking the OpenAI chat-completions dialect.
pub struct OpenAiCompatBackend {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    pub fn new(config: OpenAiConfig) -> LlmResult<Self> {
        if config.base_url.is_empty() {
            return Err(LlmError::Api(format!(
                "no base url known for backend '{}'",
                config.name
            )));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn build_messages<'a>(
        system: &'a Option<String>,
        history: &'a [ChatMessage],
        prompt: &'a str,
    ) -> Vec<ApiMessage<'a>> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = system {
            messages.push(ApiMessage {
                role: "system",
                content: system,
            });
        }
        for turn in history {
            messages.push(ApiMessage {
                role: Self::role_str(turn.role),
                content: &turn.content,
            });
        }
        messages.push(ApiMessage {
            role: "user",
            content: prompt,
        });
        messages
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn chat(&self, request: ChatRequest) -> LlmResult<String> {
        let messages =
            Self::build_messages(&request.system, &request.history, &request.prompt);
        let body = ApiRequest {
            model: &self.config.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(request.timeout_secs as u64))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(request.timeout_secs)
                } else if e.is_connect() {
                    LlmError::ConnectionFailed(e.to_string())
                } else {
                    LlmError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited(30));
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(LlmError::AuthenticationFailed);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("status {}: {}", status, text)));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("empty choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_resolve_base_urls() {
        let config = OpenAiConfig::new("deepseek", "sk-x", "deepseek-chat");
        assert!(config.base_url.contains("deepseek"));
        assert!(OpenAiCompatBackend::new(config).is_ok());
    }

    #[test]
    fn unknown_provider_requires_explicit_url() {
        let config = OpenAiConfig::new("somewhere", "sk-x", "m");
        assert!(OpenAiCompatBackend::new(config.clone()).is_err());
        let config = config.with_base_url("http://example.com/v1");
        assert!(OpenAiCompatBackend::new(config).is_ok());
    }
}
