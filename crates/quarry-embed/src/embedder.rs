//! Embedder trait and vector helpers.

use thiserror::Error;

/// Embedding error types.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Result type for embedding operations.
pub type EmbedResult<T> = Result<T, EmbedError>;

/// Converts text to dense unit-length vectors.
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;

    /// Embed a batch; the default just iterates.
    fn embed_batch(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Model name for logs.
    fn model_name(&self) -> &str;

    /// Cosine relevance of two texts.
    fn relevance(&self, a: &str, b: &str) -> EmbedResult<f32> {
        let va = self.embed(a)?;
        let vb = self.embed(b)?;
        Ok(cosine_similarity(&va, &vb))
    }
}

/// Cosine similarity of two equal-length vectors; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
