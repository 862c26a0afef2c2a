//! Bounded in-memory cache of envelopes.
//!
//! Keys are [`Request::cache_key`](crate::Request::cache_key) strings. When
//! the cache is full, the next insert clears every entry first; there is no
//! per-entry eviction.

use crate::response::Envelope;
use std::collections::HashMap;

/// Default number of entries kept before the cache is cleared.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

/// Bounded map from request key to envelope, cleared entirely on overflow.
///
/// # Examples
///
/// ```
/// use vantage::{Envelope, ResponseCache};
///
/// let mut cache = ResponseCache::new(2);
/// cache.put("a".into(), Envelope::new(200));
/// cache.put("b".into(), Envelope::new(200));
/// cache.put("c".into(), Envelope::new(200));
///
/// assert_eq!(cache.len(), 1);
/// assert!(cache.contains_key("c"));
/// ```
#[derive(Debug, Clone)]
pub struct ResponseCache {
    max_size: usize,
    entries: HashMap<String, Envelope>,
}

impl ResponseCache {
    /// Creates a cache holding at most `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: HashMap::new(),
        }
    }

    /// The configured maximum.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the cached envelope for a key.
    pub fn get(&self, key: &str) -> Option<&Envelope> {
        self.entries.get(key)
    }

    /// Stores an envelope, clearing the whole cache first if it is full.
    pub fn put(&mut self, key: String, envelope: Envelope) {
        if self.entries.len() >= self.max_size {
            tracing::debug!(
                entries = self.entries.len(),
                max_size = self.max_size,
                "Cache full - clearing"
            );
            self.entries.clear();
        }
        self.entries.insert(key, envelope);
    }

    /// Returns `true` if the key is cached.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_SIZE)
    }
}
