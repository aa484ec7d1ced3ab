//! Language model interface.
//!
//! [`LanguageModel`] is the seam every retrieval component talks through.
//! [`LmClient`] wraps any backend with the ambient machinery a production
//! deployment needs: a response cache keyed by `(prompt, backend)`,
//! requests-per-minute and tokens-per-minute limiters, bounded exponential
//! backoff on retryable failures, and token accounting.

mod cache;
mod client;
mod limiter;
mod mock;
mod model;

#[cfg(feature = "api")]
mod openai;

pub use cache::ChatCache;
pub use client::{ClientConfig, LmClient};
pub use limiter::{Rpm, Tpm};
pub use mock::MockModel;
pub use model::{ChatMessage, ChatRequest, LanguageModel, Role};

#[cfg(feature = "api")]
pub use openai::{OpenAiCompatBackend, OpenAiConfig};

/// LLM-related errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u32),

    #[error("timeout after {0} seconds")]
    Timeout(u32),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("input too long: {got} tokens (max {max})")]
    ContextTooLong { got: usize, max: usize },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("cache error: {0}")]
    Cache(String),
}

impl LlmError {
    /// Whether a retry with backoff could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_) | LlmError::Timeout(_) | LlmError::ConnectionFailed(_)
        )
    }
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
