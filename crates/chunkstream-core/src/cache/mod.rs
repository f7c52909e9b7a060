//! Byte-budgeted chunk cache with least-recently-used eviction.
//!
//! The cache tracks the summed byte size of its entries. When an insert
//! pushes the total over `max_bytes`, entries are evicted least recently
//! accessed first until the total is at or below the cleaning threshold
//! (`max_bytes * cleaning_ratio`), so the next insert does not immediately
//! trigger another pass.
//!
//! Not internally synchronized: wrap it in a mutex when it is fed from
//! download event handlers on several threads.

mod entry;

use lru::LruCache;
use serde_json::Value;

use crate::config::CacheConfig;
use crate::error::ConfigError;

pub use entry::{ByteSize, CacheEntry};

/// Entries live in two recency lists: `fresh` holds chunks never read
/// through `get_chunk` (insertion order), `used` holds chunks that were.
/// Eviction drains `fresh` before `used`, each from its least recent end.
#[derive(Debug)]
pub struct ChunkCache<T> {
    fresh: LruCache<String, CacheEntry<T>>,
    used: LruCache<String, CacheEntry<T>>,
    total_bytes: u64,
    max_bytes: u64,
    clean_threshold_bytes: u64,
}

impl<T: ByteSize> ChunkCache<T> {
    pub fn new(cfg: &CacheConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            fresh: LruCache::unbounded(),
            used: LruCache::unbounded(),
            total_bytes: 0,
            max_bytes: cfg.max_bytes,
            clean_threshold_bytes: cfg.clean_threshold_bytes(),
        })
    }

    /// Store `payload` under `id` and evict if the cache is now over budget.
    ///
    /// Replacing a live id subtracts the old entry's size first. Returns the
    /// stored entry, or `None` if the eviction pass removed it straight away
    /// (it is never-accessed, so it can be the first to go).
    pub fn create_chunk(&mut self, id: impl Into<String>, payload: T) -> Option<&CacheEntry<T>> {
        let id = id.into();
        if let Some(old) = self.take(&id) {
            tracing::warn!(id = %id, "chunk replaced while still cached");
            self.total_bytes = self.total_bytes.saturating_sub(old.byte_size());
        }
        let entry = CacheEntry::new(id.clone(), payload);
        self.total_bytes += entry.byte_size();
        self.fresh.put(id.clone(), entry);

        if self.total_bytes > self.max_bytes {
            self.clean();
        }
        tracing::debug!(
            total_mib = self.total_bytes / (1024 * 1024),
            total_bytes = self.total_bytes,
            "chunk cached"
        );
        self.fresh.peek(&id)
    }

    /// Entry for `id`, marking it as most recently used.
    pub fn get_chunk(&mut self, id: &str) -> Option<&CacheEntry<T>> {
        if let Some(entry) = self.fresh.pop(id) {
            self.used.put(id.to_string(), entry);
        }
        let entry = self.used.get_mut(id)?;
        entry.touch();
        Some(&*entry)
    }

    /// Entry for `id` without updating its recency.
    pub fn peek_chunk(&self, id: &str) -> Option<&CacheEntry<T>> {
        self.fresh.peek(id).or_else(|| self.used.peek(id))
    }

    /// Remove `id`. Returns the removed entry, if any.
    pub fn delete_chunk(&mut self, id: &str) -> Option<CacheEntry<T>> {
        let entry = self.take(id)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.byte_size());
        Some(entry)
    }

    /// Attach a metadata value to a cached chunk. Returns false if `id` is not cached.
    pub fn insert_metadata(&mut self, id: &str, key: impl Into<String>, value: Value) -> bool {
        let entry = match self.fresh.peek_mut(id) {
            Some(entry) => Some(entry),
            None => self.used.peek_mut(id),
        };
        match entry {
            Some(entry) => {
                entry.insert_metadata(key.into(), value);
                true
            }
            None => false,
        }
    }

    /// Tracked byte total; with `force_recompute` it is rebuilt from the payloads first.
    pub fn total_byte_size(&mut self, force_recompute: bool) -> u64 {
        if force_recompute {
            self.total_bytes = self
                .fresh
                .iter()
                .chain(self.used.iter())
                .map(|(_, e)| e.payload().byte_size())
                .sum();
        }
        self.total_bytes
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fresh.contains(id) || self.used.contains(id)
    }

    pub fn len(&self) -> usize {
        self.fresh.len() + self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fresh.is_empty() && self.used.is_empty()
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn clean_threshold_bytes(&self) -> u64 {
        self.clean_threshold_bytes
    }

    /// Cached ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fresh
            .iter()
            .chain(self.used.iter())
            .map(|(id, _)| id.as_str())
    }

    /// Drop every entry and reset the byte total.
    pub fn clear(&mut self) {
        self.fresh.clear();
        self.used.clear();
        self.total_bytes = 0;
    }

    fn take(&mut self, id: &str) -> Option<CacheEntry<T>> {
        self.fresh.pop(id).or_else(|| self.used.pop(id))
    }

    /// Evict least recently used entries until at or below the cleaning threshold.
    fn clean(&mut self) {
        let mut evicted = 0usize;
        while self.total_bytes > self.clean_threshold_bytes {
            let Some((_, entry)) = self.fresh.pop_lru().or_else(|| self.used.pop_lru()) else {
                break;
            };
            self.total_bytes = self.total_bytes.saturating_sub(entry.byte_size());
            evicted += 1;
        }
        tracing::debug!(
            evicted,
            remaining = self.len(),
            total_bytes = self.total_bytes,
            threshold = self.clean_threshold_bytes,
            "cache cleaned"
        );
    }
}
