//! Bounded response cache keyed by URL
//!
//! Entries are never evicted or invalidated within a run. Once the cache
//! holds `capacity` entries, new URLs are simply not cached.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

pub struct ResponseCache {
    entries: DashMap<String, Arc<Value>>,
    // Reserved slots; incremented before insert so concurrent writers never overshoot
    reserved: AtomicUsize,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            reserved: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<Value>> {
        self.entries.get(url).map(|entry| Arc::clone(entry.value()))
    }

    /// Store a response; returns false when the cache is full or the URL is already cached
    pub fn insert(&self, url: &str, value: Arc<Value>) -> bool {
        match self.entries.entry(url.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                if self.reserved.fetch_add(1, Ordering::SeqCst) >= self.capacity {
                    self.reserved.fetch_sub(1, Ordering::SeqCst);
                    return false;
                }
                slot.insert(value);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
