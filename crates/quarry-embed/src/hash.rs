//! Deterministic hash-projection embedder.
//!
//! Words and CJK character bigrams are hashed into a fixed-dimension
//! space with several hash seeds, signed, accumulated and L2-normalized.
//! Not semantically rich, but deterministic and dependency-free, which is
//! what index construction and tests need as a baseline backend.

use crate::{EmbedError, EmbedResult, Embedder};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct HashEmbedder {
    dimension: usize,
    num_hashes: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            num_hashes: 4,
        }
    }

    /// Default 256-dimensional embedder.
    pub fn default_dimension() -> Self {
        Self::new(256)
    }

    /// Alphanumeric words plus CJK character bigrams, so Chinese text
    /// embeds without a tokenizer model.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut tokens: Vec<String> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1 && s.is_ascii())
            .map(|s| s.to_string())
            .collect();

        let cjk: Vec<char> = lower.chars().filter(|c| is_cjk(*c)).collect();
        for ch in &cjk {
            tokens.push(ch.to_string());
        }
        for pair in cjk.windows(2) {
            tokens.push(format!("{}{}", pair[0], pair[1]));
        }
        tokens
    }

    fn hash_with_seed(&self, token: &str, seed: u64) -> usize {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn sign_hash(&self, token: &str, seed: u64) -> f32 {
        let mut hasher = DefaultHasher::new();
        (seed + 1000).hash(&mut hasher);
        token.hash(&mut hasher);
        if hasher.finish() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::default_dimension()
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput("empty text".to_string()));
        }

        let tokens = self.tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            for seed in 0..self.num_hashes as u64 {
                let idx = self.hash_with_seed(token, seed);
                vector[idx] += self.sign_hash(token, seed);
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-projection"
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_normalized() {
        let e = HashEmbedder::new(64);
        let a = e.embed("cell membrane transport").unwrap();
        let b = e.embed("cell membrane transport").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identical_text_is_most_similar() {
        let e = HashEmbedder::default_dimension();
        let same = e.relevance("rice genome", "rice genome").unwrap();
        let diff = e.relevance("rice genome", "stock market crash").unwrap();
        assert!(same > diff);
        assert!((same - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cjk_text_embeds() {
        let e = HashEmbedder::default_dimension();
        let v = e.embed("水稻基因组").unwrap();
        assert!(v.iter().any(|x| *x != 0.0));
    }

    #[test]
    fn empty_text_rejected() {
        let e = HashEmbedder::default_dimension();
        assert!(e.embed("   ").is_err());
    }
}
