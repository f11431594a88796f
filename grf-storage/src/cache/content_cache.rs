//! Doubly-bounded LRU cache for extracted file contents
//!
//! Bounded by entry count and by total byte budget at the same time.
//! Buffers are shared by `Arc`; admission never copies. A single buffer
//! larger than a tenth of the byte budget is never admitted, so one huge
//! file cannot flush the whole cache.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

pub struct ContentCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    max_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    oversize_rejections: AtomicU64,
}

struct CacheInner {
    map: LruCache<String, Arc<Vec<u8>>>,
    bytes: usize,
}

/// Point-in-time counters for the stats surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub entries: usize,
    pub bytes: usize,
    pub max_entries: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub oversize_rejections: u64,
}

impl ContentCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: LruCache::unbounded(),
                bytes: 0,
            }),
            max_entries: max_entries.max(1),
            max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            oversize_rejections: AtomicU64::new(0),
        }
    }

    /// Fetch and promote to most-recently-used.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let mut inner = self.inner.lock();
        match inner.map.get(key) {
            Some(buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(buf))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Admit a buffer, evicting least-recently-used entries until both
    /// bounds hold. Returns whether the buffer was admitted.
    pub fn put(&self, key: String, buf: Arc<Vec<u8>>) -> bool {
        let size = buf.len();
        if size > self.max_bytes / 10 {
            self.oversize_rejections.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, size, "buffer above max_bytes/10, not admitted");
            return false;
        }

        let mut inner = self.inner.lock();
        if let Some(old) = inner.map.pop(&key) {
            inner.bytes -= old.len();
        }

        while inner.map.len() + 1 > self.max_entries
            || inner.bytes + size > self.max_bytes
        {
            let Some((evicted_key, evicted)) = inner.map.pop_lru() else {
                break;
            };
            inner.bytes -= evicted.len();
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %evicted_key, size = evicted.len(), "evicted from cache");
        }

        inner.bytes += size;
        inner.map.put(key, buf);
        true
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> usize {
        self.inner.lock().bytes
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let (entries, bytes) = {
            let inner = self.inner.lock();
            (inner.map.len(), inner.bytes)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStatsSnapshot {
            entries,
            bytes,
            max_entries: self.max_entries,
            max_bytes: self.max_bytes,
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            evictions: self.evictions.load(Ordering::Relaxed),
            oversize_rejections: self.oversize_rejections.load(Ordering::Relaxed),
        }
    }
}
