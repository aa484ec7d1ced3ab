//! Client wrapper adding cache, limiters, retry and accounting to any
//! backend.

use crate::{ChatCache, ChatRequest, LanguageModel, LlmError, LlmResult, Rpm, Tpm};
use async_trait::async_trait;
use quarry_core::token_len;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Client-side knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Largest prompt the backend context window admits.
    pub max_context_tokens: usize,
    pub requests_per_minute: usize,
    pub tokens_per_minute: usize,
    /// Retry attempts for retryable failures.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 32000 - 4096,
            requests_per_minute: 500,
            tokens_per_minute: 20000,
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// [`LanguageModel`] wrapper: cache lookup, context guard, limiter waits,
/// bounded exponential backoff, token accounting.
pub struct LmClient {
    backend: Arc<dyn LanguageModel>,
    cache: Option<Arc<ChatCache>>,
    rpm: Rpm,
    tpm: Tpm,
    config: ClientConfig,
    input_tokens: AtomicUsize,
    output_tokens: AtomicUsize,
}

impl LmClient {
    pub fn new(backend: Arc<dyn LanguageModel>, config: ClientConfig) -> Self {
        Self {
            backend,
            cache: None,
            rpm: Rpm::new(config.requests_per_minute),
            tpm: Tpm::new(config.tokens_per_minute),
            config,
            input_tokens: AtomicUsize::new(0),
            output_tokens: AtomicUsize::new(0),
        }
    }

    pub fn with_cache(mut self, cache: ChatCache) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Input tokens consumed so far.
    pub fn sum_input_tokens(&self) -> usize {
        self.input_tokens.load(Ordering::Relaxed)
    }

    /// Output tokens consumed so far.
    pub fn sum_output_tokens(&self) -> usize {
        self.output_tokens.load(Ordering::Relaxed)
    }

    /// Enforce the context window, truncating when permitted.
    fn guard_context(&self, request: &mut ChatRequest) -> LlmResult<usize> {
        let mut input_tokens = token_len(&request.prompt);
        if input_tokens > self.config.max_context_tokens {
            if !request.allow_truncate {
                return Err(LlmError::ContextTooLong {
                    got: input_tokens,
                    max: self.config.max_context_tokens,
                });
            }
            while token_len(&request.prompt) > self.config.max_context_tokens {
                let keep = request.prompt.len() * 9 / 10;
                let cut = request
                    .prompt
                    .char_indices()
                    .take_while(|(i, _)| *i < keep)
                    .last()
                    .map(|(i, c)| i + c.len_utf8())
                    .unwrap_or(0);
                request.prompt.truncate(cut);
            }
            input_tokens = token_len(&request.prompt);
            debug!(tokens = input_tokens, "prompt truncated to context window");
        }
        Ok(input_tokens)
    }

    async fn call_with_retry(&self, request: &ChatRequest) -> LlmResult<String> {
        let mut backoff = self.config.backoff_base;
        let mut attempt = 0;
        loop {
            match self.backend.chat(request.clone()).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    attempt += 1;
                    warn!(attempt, error = %e, "retryable model failure, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl LanguageModel for LmClient {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn chat(&self, mut request: ChatRequest) -> LlmResult<String> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&request.prompt, self.backend.name())? {
                debug!("chat cache hit");
                return Ok(hit);
            }
        }

        let input_tokens = self.guard_context(&mut request)?;
        self.tpm.wait(input_tokens).await;

        let content = self.call_with_retry(&request).await?;

        if let Some(cache) = &self.cache {
            cache.add(&request.prompt, self.backend.name(), &content)?;
        }
        let output_tokens = token_len(&content);
        self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(output_tokens, Ordering::Relaxed);

        self.tpm.wait(output_tokens).await;
        self.rpm.wait().await;
        Ok(content)
    }

    async fn chat_stream(&self, mut request: ChatRequest) -> LlmResult<mpsc::Receiver<String>> {
        let backend_name = self.backend.name().to_string();
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&request.prompt, &backend_name)? {
                let (tx, rx) = mpsc::channel(1);
                tokio::spawn(async move {
                    let _ = tx.send(hit).await;
                });
                return Ok(rx);
            }
        }

        let input_tokens = self.guard_context(&mut request)?;
        self.tpm.wait(input_tokens).await;
        self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);

        let prompt = request.prompt.clone();
        let mut inner = self.backend.chat_stream(request).await?;
        let (tx, rx) = mpsc::channel(16);
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let mut full = String::new();
            while let Some(piece) = inner.recv().await {
                full.push_str(&piece);
                if tx.send(piece).await.is_err() {
                    return;
                }
            }
            if let Some(cache) = cache {
                if let Err(e) = cache.add(&prompt, &backend_name, &full) {
                    warn!(error = %e, "failed to cache streamed reply");
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockModel;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn caches_identical_prompts() {
        let backend = Arc::new(MockModel::new().with_default("reply"));
        let client = LmClient::new(backend.clone(), ClientConfig::default())
            .with_cache(ChatCache::in_memory().unwrap());

        let a = client.chat(ChatRequest::new("same prompt")).await.unwrap();
        let b = client.chat(ChatRequest::new("same prompt")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn rejects_oversized_prompt_without_truncate() {
        let backend = Arc::new(MockModel::new().with_default("x"));
        let config = ClientConfig {
            max_context_tokens: 4,
            ..Default::default()
        };
        let client = LmClient::new(backend, config);
        let err = client
            .chat(ChatRequest::new("a very long prompt that exceeds four tokens easily"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ContextTooLong { .. }));
    }

    #[tokio::test]
    async fn truncates_when_allowed() {
        let backend = Arc::new(MockModel::new().with_default("ok"));
        let config = ClientConfig {
            max_context_tokens: 4,
            ..Default::default()
        };
        let client = LmClient::new(backend, config);
        let out = client
            .chat(
                ChatRequest::new("a very long prompt that exceeds four tokens easily")
                    .allow_truncate(),
            )
            .await
            .unwrap();
        assert_eq!(out, "ok");
    }

    struct FlakyModel {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl LanguageModel for FlakyModel {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn chat(&self, _request: ChatRequest) -> LlmResult<String> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(LlmError::Timeout(1))
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_failures() {
        let backend = Arc::new(FlakyModel {
            failures_left: AtomicU32::new(2),
        });
        let client = LmClient::new(backend, ClientConfig::default());
        let out = client.chat(ChatRequest::new("q")).await.unwrap();
        assert_eq!(out, "recovered");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let backend = Arc::new(FlakyModel {
            failures_left: AtomicU32::new(100),
        });
        let config = ClientConfig {
            max_attempts: 2,
            ..Default::default()
        };
        let client = LmClient::new(backend, config);
        assert!(client.chat(ChatRequest::new("q")).await.is_err());
    }

    #[tokio::test]
    async fn accounts_tokens() {
        let backend = Arc::new(MockModel::new().with_default("four token reply text"));
        let client = LmClient::new(backend, ClientConfig::default());
        client.chat(ChatRequest::new("some prompt")).await.unwrap();
        assert!(client.sum_input_tokens() > 0);
        assert!(client.sum_output_tokens() > 0);
    }
}
