//! Navigable-graph approximate nearest-neighbor structure.
//!
//! A single-layer small-world graph: each inserted point links to its
//! `max_neighbors` closest among the `ef_construction` candidates found by
//! greedy search from the entry point. Queries run the same best-first
//! search with an `ef_search` frontier. Both breadths trade recall against
//! latency.

use crate::{DistanceStrategy, IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Construction and search breadth knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnnParams {
    /// Maximum links kept per node.
    pub max_neighbors: usize,
    /// Candidate frontier while inserting.
    pub ef_construction: usize,
    /// Candidate frontier while searching.
    pub ef_search: usize,
}

impl Default for AnnParams {
    fn default() -> Self {
        Self {
            max_neighbors: 32,
            ef_construction: 64,
            ef_search: 128,
        }
    }
}

/// Total-ordered f32 distance for heap use.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Dist(f32);

impl Eq for Dist {}

impl PartialOrd for Dist {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dist {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// The ANN graph itself: vectors plus adjacency lists keyed by insertion
/// index.
#[derive(Debug, Serialize, Deserialize)]
pub struct NavigableGraph {
    params: AnnParams,
    strategy: DistanceStrategy,
    vectors: Vec<Vec<f32>>,
    neighbors: Vec<Vec<usize>>,
}

impl NavigableGraph {
    pub fn new(strategy: DistanceStrategy, params: AnnParams) -> Self {
        Self {
            params,
            strategy,
            vectors: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    pub fn strategy(&self) -> DistanceStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Insert a vector, returning its index.
    pub fn insert(&mut self, vector: Vec<f32>) -> IndexResult<usize> {
        if let Some(first) = self.vectors.first() {
            if first.len() != vector.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: first.len(),
                    got: vector.len(),
                });
            }
        }

        let new_idx = self.vectors.len();
        if new_idx == 0 {
            self.vectors.push(vector);
            self.neighbors.push(Vec::new());
            return Ok(0);
        }

        let candidates = self.greedy_search(&vector, self.params.ef_construction);
        let links: Vec<usize> = candidates
            .iter()
            .take(self.params.max_neighbors)
            .map(|(idx, _)| *idx)
            .collect();

        self.vectors.push(vector);
        self.neighbors.push(links.clone());
        for link in links {
            self.neighbors[link].push(new_idx);
            if self.neighbors[link].len() > self.params.max_neighbors {
                self.prune(link);
            }
        }
        Ok(new_idx)
    }

    /// Drop the farthest links of an over-full node.
    fn prune(&mut self, node: usize) {
        let origin = self.vectors[node].clone();
        let mut links: Vec<(usize, f32)> = self.neighbors[node]
            .iter()
            .map(|&n| (n, self.strategy.raw_distance(&origin, &self.vectors[n])))
            .collect();
        links.sort_by(|a, b| a.1.total_cmp(&b.1));
        links.truncate(self.params.max_neighbors);
        self.neighbors[node] = links.into_iter().map(|(n, _)| n).collect();
    }

    /// Best-first search over the graph. Returns `(index, raw distance)`
    /// ascending by distance, at most `ef` entries.
    fn greedy_search(&self, query: &[f32], ef: usize) -> Vec<(usize, f32)> {
        if self.vectors.is_empty() || ef == 0 {
            return Vec::new();
        }
        let entry = 0usize;
        let entry_dist = self.strategy.raw_distance(query, &self.vectors[entry]);

        let mut visited: HashSet<usize> = HashSet::from([entry]);
        // min-heap of nodes still to expand
        let mut frontier: BinaryHeap<Reverse<(Dist, usize)>> = BinaryHeap::new();
        frontier.push(Reverse((Dist(entry_dist), entry)));
        // max-heap keeping the ef closest found so far
        let mut best: BinaryHeap<(Dist, usize)> = BinaryHeap::new();
        best.push((Dist(entry_dist), entry));

        while let Some(Reverse((dist, node))) = frontier.pop() {
            if best.len() >= ef {
                if let Some((worst, _)) = best.peek() {
                    if dist > *worst {
                        break;
                    }
                }
            }
            for &next in &self.neighbors[node] {
                if !visited.insert(next) {
                    continue;
                }
                let next_dist = Dist(self.strategy.raw_distance(query, &self.vectors[next]));
                let admit = best.len() < ef
                    || best.peek().map(|(worst, _)| next_dist < *worst).unwrap_or(true);
                if admit {
                    frontier.push(Reverse((next_dist, next)));
                    best.push((next_dist, next));
                    if best.len() > ef {
                        best.pop();
                    }
                }
            }
        }

        let mut results: Vec<(usize, f32)> =
            best.into_iter().map(|(d, i)| (i, d.0)).collect();
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        results
    }

    /// K nearest neighbors as `(index, raw distance)` ascending.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let ef = self.params.ef_search.max(k);
        let mut results = self.greedy_search(query, ef);
        results.truncate(k);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(theta: f32) -> Vec<f32> {
        vec![theta.cos(), theta.sin()]
    }

    #[test]
    fn exact_vector_is_nearest() {
        let mut g = NavigableGraph::new(DistanceStrategy::Euclidean, AnnParams::default());
        for i in 0..20 {
            g.insert(unit(i as f32 * 0.3)).unwrap();
        }
        let query = unit(5.0 * 0.3);
        let results = g.search(&query, 3);
        assert_eq!(results[0].0, 5);
        assert!(results[0].1.abs() < 1e-6);
    }

    #[test]
    fn results_ascend_by_distance() {
        let mut g = NavigableGraph::new(DistanceStrategy::Euclidean, AnnParams::default());
        for i in 0..50 {
            g.insert(unit(i as f32 * 0.13)).unwrap();
        }
        let results = g.search(&unit(1.0), 10);
        assert_eq!(results.len(), 10);
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut g = NavigableGraph::new(DistanceStrategy::Euclidean, AnnParams::default());
        g.insert(vec![0.0, 1.0]).unwrap();
        assert!(matches!(
            g.insert(vec![0.0, 1.0, 2.0]),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_graph_searches_empty() {
        let g = NavigableGraph::new(DistanceStrategy::Euclidean, AnnParams::default());
        assert!(g.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn narrow_breadth_still_finds_close_points() {
        let params = AnnParams {
            max_neighbors: 4,
            ef_construction: 8,
            ef_search: 16,
        };
        let mut g = NavigableGraph::new(DistanceStrategy::Euclidean, params);
        for i in 0..100 {
            g.insert(unit(i as f32 * 0.0628)).unwrap();
        }
        let results = g.search(&unit(0.5), 5);
        assert!(!results.is_empty());
        // nearest found should be within a small angular distance
        assert!(results[0].1 < 0.05);
    }
}
