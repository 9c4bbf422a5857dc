//! Chunked read-through cache over the flat node array.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bag_common::{BagError, BagResult};
use lru::LruCache;
use tracing::debug;

use crate::records::NodePair;
use crate::store::SharedStore;

/// Node-chunk size used when the backing store reports none.
pub const DEFAULT_NODE_CHUNK: usize = 1024;

/// Hit/miss counters for the node-chunk cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValueCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// LRU cache of chunk-aligned node runs.
///
/// `get` maps a global node index to its chunk, loads the chunk from the
/// backing store on a miss (clamped at the array tail), and evicts the
/// least-recently-used chunk once the chunk-count budget is reached. The
/// backing data is read-only, so chunks are never refreshed.
pub struct ValueCache {
    store: Arc<SharedStore>,
    chunk_size: usize,
    chunks: Mutex<LruCache<usize, Vec<NodePair>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ValueCache {
    /// Create a cache holding at most `capacity` chunks.
    ///
    /// The chunk size follows the backing store's natural node chunking,
    /// falling back to [`DEFAULT_NODE_CHUNK`].
    pub fn new(store: Arc<SharedStore>, capacity: usize) -> Self {
        let reported = store.node_chunk();
        let chunk_size = if reported == 0 {
            DEFAULT_NODE_CHUNK
        } else {
            reported
        };
        let cache_size = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            chunk_size,
            chunks: Mutex::new(LruCache::new(cache_size)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Depth/uncertainty pair of the node at a global index.
    pub fn get(&self, index: usize) -> BagResult<NodePair> {
        let total = self.store.node_count();
        if index >= total {
            return Err(BagError::NodeIndexOutOfRange { index, total });
        }

        let chunk_start = (index / self.chunk_size) * self.chunk_size;
        if let Some(chunk) = self.lock_chunks()?.get(&chunk_start) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(chunk[index - chunk_start]);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let count = self.chunk_size.min(total - chunk_start);
        debug!(chunk_start, count, "loading refinement node chunk");
        let nodes = self.store.node_run(chunk_start, count)?;
        let pair = nodes
            .get(index - chunk_start)
            .copied()
            .ok_or_else(|| BagError::decode(format!("short node chunk at {chunk_start}")))?;
        self.lock_chunks()?.put(chunk_start, nodes);
        Ok(pair)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn stats(&self) -> ValueCacheStats {
        ValueCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lock_chunks(&self) -> BagResult<MutexGuard<'_, LruCache<usize, Vec<NodePair>>>> {
        self.chunks
            .lock()
            .map_err(|_| BagError::storage("value cache lock poisoned"))
    }
}

impl std::fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCache")
            .field("chunk_size", &self.chunk_size)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn store_with_nodes(count: usize, node_chunk: usize) -> Arc<SharedStore> {
        let mut store = MemoryStore::new(1, 1);
        let nodes: Vec<NodePair> = (0..count)
            .map(|i| NodePair::new(i as f32, i as f32 / 10.0))
            .collect();
        store.push_nodes(&nodes);
        store.set_chunk_sizes((0, 0), node_chunk);
        Arc::new(SharedStore::new(Box::new(store)))
    }

    #[test]
    fn test_hit_miss_accounting() {
        let cache = ValueCache::new(store_with_nodes(16, 4), 8);
        assert_eq!(cache.get(5).unwrap(), NodePair::new(5.0, 0.5));
        assert_eq!(cache.get(6).unwrap(), NodePair::new(6.0, 0.6));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_default_chunk_size_when_unreported() {
        let cache = ValueCache::new(store_with_nodes(4, 0), 2);
        assert_eq!(cache.chunk_size(), DEFAULT_NODE_CHUNK);
        assert_eq!(cache.get(3).unwrap(), NodePair::new(3.0, 0.3));
    }

    #[test]
    fn test_tail_chunk_is_clamped() {
        // 10 nodes in chunks of 4: the last chunk holds only 2 records.
        let cache = ValueCache::new(store_with_nodes(10, 4), 8);
        assert_eq!(cache.get(9).unwrap(), NodePair::new(9.0, 0.9));
        assert!(cache.get(10).is_err());
    }

    #[test]
    fn test_results_survive_eviction() {
        // Capacity of one chunk: alternating far-apart indices force an
        // eviction on every access.
        let cache = ValueCache::new(store_with_nodes(16, 4), 1);
        let before = cache.get(1).unwrap();
        let _ = cache.get(13).unwrap();
        let after = cache.get(1).unwrap();
        assert_eq!(before, after);
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 3);
    }
}
