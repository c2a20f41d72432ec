//! Query cache seam.
//!
//! The channel never owns cached data; it only tells the cache which queries
//! went stale.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use pulsewire_core::QueryKey;

/// Receiver of invalidation requests.
pub trait QueryCache: Send + 'static {
    /// Mark every cached entry under `key` as stale.
    fn invalidate(&self, key: QueryKey);
}

/// Cache bookkeeping that bumps a generation counter per key.
///
/// Readers compare the generation they fetched at with the current one to
/// decide whether to refetch. Clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct GenerationCache {
    generations: Arc<Mutex<HashMap<QueryKey, u64>>>,
}

impl GenerationCache {
    /// Create a cache with every key at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation of `key`.
    pub fn generation(&self, key: QueryKey) -> u64 {
        let generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        generations.get(&key).copied().unwrap_or(0)
    }
}

impl QueryCache for GenerationCache {
    fn invalidate(&self, key: QueryKey) {
        let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        *generations.entry(key).or_insert(0) += 1;
        tracing::debug!(%key, "query invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_bumps_only_that_key() {
        let cache = GenerationCache::new();
        let shared = cache.clone();

        cache.invalidate(QueryKey::Dashboard);
        cache.invalidate(QueryKey::Dashboard);
        cache.invalidate(QueryKey::Users);

        assert_eq!(shared.generation(QueryKey::Dashboard), 2);
        assert_eq!(shared.generation(QueryKey::Users), 1);
        assert_eq!(shared.generation(QueryKey::Engagement), 0);
    }
}
