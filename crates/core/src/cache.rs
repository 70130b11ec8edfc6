//! Surprise score cache: `(memory_id, context_hash) → KL score`.
//!
//! Invalidation is explicit, never TTL-based: memory mutations invalidate
//! that memory's entries, synthesis events invalidate everything.  Both are
//! implemented as generation counters so invalidation is O(1) and publishes
//! atomically before the next retrieval cycle can read.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stable hash of the retrieval context.  Covers the user message only; a
/// wholesale identity replacement must be followed by `invalidate_all` so
/// stale scores cannot cross identity changes.
pub fn context_hash(user_message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_message.as_bytes());
    format!("{:x}", hasher.finalize())
}

struct CacheEntry {
    score: f64,
    global_gen: u64,
    memory_gen: u64,
}

struct Inner {
    entries: LruCache<(Uuid, String), CacheEntry>,
    global_gen: u64,
    memory_gens: HashMap<Uuid, u64>,
}

pub struct SurpriseCache {
    inner: Mutex<Inner>,
}

impl SurpriseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                global_gen: 0,
                memory_gens: HashMap::new(),
            }),
        }
    }

    /// Cached KL score, or `None` when absent or invalidated.
    pub fn get(&self, memory_id: Uuid, context_hash: &str) -> Option<f64> {
        let mut inner = self.inner.lock();
        let current_memory_gen = inner.memory_gens.get(&memory_id).copied().unwrap_or(0);
        let current_global_gen = inner.global_gen;
        let entry = inner.entries.get(&(memory_id, context_hash.to_string()))?;
        if entry.global_gen == current_global_gen && entry.memory_gen == current_memory_gen {
            Some(entry.score)
        } else {
            None
        }
    }

    pub fn put(&self, memory_id: Uuid, context_hash: String, score: f64) {
        let mut inner = self.inner.lock();
        let global_gen = inner.global_gen;
        let memory_gen = inner.memory_gens.get(&memory_id).copied().unwrap_or(0);
        inner.entries.put(
            (memory_id, context_hash),
            CacheEntry { score, global_gen, memory_gen },
        );
    }

    /// Invalidate every entry for one memory.  Called on memory write,
    /// update, and delete.
    pub fn invalidate_memory(&self, memory_id: Uuid) {
        let mut inner = self.inner.lock();
        *inner.memory_gens.entry(memory_id).or_insert(0) += 1;
    }

    /// Invalidate the whole cache.  Called on synthesis events and identity
    /// replacement.
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        inner.global_gen += 1;
        inner.entries.clear();
        inner.memory_gens.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
