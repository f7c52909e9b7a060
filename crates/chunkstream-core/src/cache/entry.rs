//! Cached chunk entry and payload sizing.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

/// Payloads report how many bytes they account for in the cache budget.
pub trait ByteSize {
    fn byte_size(&self) -> u64;
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteSize for Box<[u8]> {
    fn byte_size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ByteSize + ?Sized> ByteSize for Arc<T> {
    fn byte_size(&self) -> u64 {
        (**self).byte_size()
    }
}

/// One cached chunk: the decoded payload plus bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<T> {
    id: String,
    payload: T,
    byte_size: u64,
    created_at: Instant,
    last_access_at: Option<Instant>,
    metadata: Map<String, Value>,
}

impl<T: ByteSize> CacheEntry<T> {
    pub(super) fn new(id: String, payload: T) -> Self {
        let byte_size = payload.byte_size();
        Self {
            id,
            payload,
            byte_size,
            created_at: Instant::now(),
            last_access_at: None,
            metadata: Map::new(),
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Size accounted when the entry was created.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// `None` until the entry is first read through `ChunkCache::get_chunk`.
    pub fn last_access_at(&self) -> Option<Instant> {
        self.last_access_at
    }

    pub(super) fn touch(&mut self) {
        self.last_access_at = Some(Instant::now());
    }

    /// Metadata value by key.
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn all_metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub(super) fn insert_metadata(&mut self, key: String, value: Value) -> Option<Value> {
        self.metadata.insert(key, value)
    }
}
