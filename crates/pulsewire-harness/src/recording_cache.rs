//! Cache that records invalidations for assertions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pulsewire_app::QueryCache;
use pulsewire_core::QueryKey;

/// Query cache that remembers every invalidation in order.
///
/// Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingCache {
    log: Arc<Mutex<Vec<QueryKey>>>,
}

impl RecordingCache {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueryKey>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidations so far.
    pub fn invalidated(&self) -> Vec<QueryKey> {
        self.lock().clone()
    }

    /// Return and forget the invalidations so far.
    pub fn take(&self) -> Vec<QueryKey> {
        std::mem::take(&mut *self.lock())
    }
}

impl QueryCache for RecordingCache {
    fn invalidate(&self, key: QueryKey) {
        self.lock().push(key);
    }
}
