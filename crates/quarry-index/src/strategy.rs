//! Distance strategies and their relevance mappings.

use serde::{Deserialize, Serialize};

/// How raw vector distances map to relevance scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceStrategy {
    /// L2 distance, mapped to a bounded relevance in roughly [0, 1] for
    /// unit-normalized embeddings.
    #[default]
    Euclidean,
    /// Raw inner product; may be negative, higher is more similar.
    InnerProduct,
}

impl DistanceStrategy {
    /// Internal comparison value where lower is always better.
    pub(crate) fn raw_distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceStrategy::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            DistanceStrategy::InnerProduct => {
                -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
            }
        }
    }

    /// Map an internal distance to the caller-visible relevance score.
    pub fn relevance(&self, raw_distance: f32) -> f32 {
        match self {
            // unit vectors are at most sqrt(2) apart
            DistanceStrategy::Euclidean => 1.0 - raw_distance.max(0.0).sqrt() / 2f32.sqrt(),
            DistanceStrategy::InnerProduct => -raw_distance,
        }
    }

    /// Best possible relevance for this strategy.
    pub fn max_relevance(&self) -> f32 {
        match self {
            DistanceStrategy::Euclidean => 1.0,
            DistanceStrategy::InnerProduct => f32::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_relevance_is_bounded() {
        let s = DistanceStrategy::Euclidean;
        assert!((s.relevance(0.0) - 1.0).abs() < 1e-6);
        // opposite unit vectors: squared distance 4 -> negative relevance
        assert!(s.relevance(4.0) < 0.0);
        // identical vectors always win
        assert!(s.relevance(0.0) > s.relevance(0.5));
    }

    #[test]
    fn inner_product_passes_through() {
        let s = DistanceStrategy::InnerProduct;
        let a = [0.6f32, 0.8];
        let b = [0.6f32, 0.8];
        let raw = s.raw_distance(&a, &b);
        assert!((s.relevance(raw) - 1.0).abs() < 1e-5);
        let c = [-0.6f32, -0.8];
        let raw_neg = s.raw_distance(&a, &c);
        assert!(s.relevance(raw_neg) < 0.0);
    }
}
