//! Bounded pool of constructed retriever instances.

use crate::{KnowledgeRetriever, ReasonRetriever, RetrieveResource, RetrieveResult, Retriever};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

/// Which retrieval strategy an instance implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrieveStrategy {
    Knowledge,
    Reason,
}

struct PoolEntry {
    retriever: Arc<dyn Retriever>,
    last_used: Instant,
}

/// Caches lazily constructed (disk-loading) retrievers keyed by
/// `(scope, strategy)`, evicting the least-recently-used entry at
/// capacity.
///
/// Access is serialized by a mutex, so a preemptive runtime is safe; the
/// expected access pattern is still one cooperative task at a time.
pub struct RetrieverPool {
    resource: RetrieveResource,
    capacity: usize,
    cache: Mutex<HashMap<(String, RetrieveStrategy), PoolEntry>>,
}

impl RetrieverPool {
    pub fn new(resource: RetrieveResource, capacity: usize) -> Self {
        Self {
            resource,
            capacity: capacity.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the retriever for `(scope, strategy)`, constructing it from
    /// `work_dir` on first use.
    pub fn get(
        &self,
        scope: &str,
        work_dir: &Path,
        strategy: RetrieveStrategy,
    ) -> RetrieveResult<Arc<dyn Retriever>> {
        let key = (scope.to_string(), strategy);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = cache.get_mut(&key) {
            entry.last_used = Instant::now();
            return Ok(entry.retriever.clone());
        }

        if cache.len() >= self.capacity {
            if let Some(oldest) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            {
                debug!(scope = %oldest.0, "evicting least-recently-used retriever");
                cache.remove(&oldest);
            }
        }

        let retriever: Arc<dyn Retriever> = match strategy {
            RetrieveStrategy::Knowledge => {
                Arc::new(KnowledgeRetriever::open(self.resource.clone(), work_dir)?)
            }
            RetrieveStrategy::Reason => {
                Arc::new(ReasonRetriever::open(self.resource.clone(), work_dir)?)
            }
        };
        cache.insert(
            key,
            PoolEntry {
                retriever: retriever.clone(),
                last_used: Instant::now(),
            },
        );
        Ok(retriever)
    }

    /// Drop every cached instance for a scope.
    pub fn evict_scope(&self, scope: &str) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|(s, _), _| s != scope);
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::MemoryGraph;
    use quarry_embed::HashEmbedder;
    use quarry_llm::MockModel;

    fn resource() -> RetrieveResource {
        RetrieveResource::new(
            Arc::new(MockModel::new()),
            Arc::new(HashEmbedder::default_dimension()),
            Arc::new(MemoryGraph::new()),
        )
    }

    #[test]
    fn caches_and_reuses_instances() {
        let dir = tempfile::tempdir().unwrap();
        let pool = RetrieverPool::new(resource(), 4);

        let a = pool
            .get("alpha", dir.path(), RetrieveStrategy::Knowledge)
            .unwrap();
        let b = pool
            .get("alpha", dir.path(), RetrieveStrategy::Knowledge)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let pool = RetrieverPool::new(resource(), 2);

        pool.get("a", dir.path(), RetrieveStrategy::Knowledge)
            .unwrap();
        pool.get("b", dir.path(), RetrieveStrategy::Knowledge)
            .unwrap();
        // touch "a" so "b" becomes the eviction candidate
        pool.get("a", dir.path(), RetrieveStrategy::Knowledge)
            .unwrap();
        pool.get("c", dir.path(), RetrieveStrategy::Knowledge)
            .unwrap();

        assert_eq!(pool.len(), 2);
        let cache = pool.cache.lock().unwrap();
        assert!(cache.contains_key(&("a".to_string(), RetrieveStrategy::Knowledge)));
        assert!(cache.contains_key(&("c".to_string(), RetrieveStrategy::Knowledge)));
    }

    #[test]
    fn scope_eviction_clears_all_strategies() {
        let dir = tempfile::tempdir().unwrap();
        let pool = RetrieverPool::new(resource(), 4);
        pool.get("a", dir.path(), RetrieveStrategy::Knowledge)
            .unwrap();
        pool.get("a", dir.path(), RetrieveStrategy::Reason).unwrap();
        pool.evict_scope("a");
        assert!(pool.is_empty());
    }
}
