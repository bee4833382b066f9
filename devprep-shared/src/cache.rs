//! In-process expiring cache
//!
//! A plain key → (value, inserted_at) map used to avoid repeated reads of
//! frequently requested content. Entries expire once more than the configured
//! TTL has elapsed since they were set; an expired entry is removed by the
//! `get` that finds it. There is no size bound and no LRU eviction, so this is
//! only suitable for small, bounded content sets such as the topic catalogue.
//!
//! Time is read from `tokio::time::Instant`, which lets tests pause and advance
//! the clock.
//!
//! # Example
//!
//! ```
//! use devprep_shared::cache::ExpiringCache;
//! use std::time::Duration;
//!
//! let cache: ExpiringCache<String> = ExpiringCache::new(Duration::from_secs(60));
//! cache.set("topic:flutter-basics", "Flutter Basics".to_string());
//! assert_eq!(cache.get("topic:flutter-basics").as_deref(), Some("Flutter Basics"));
//!
//! cache.invalidate("topic:flutter-basics");
//! assert!(cache.get("topic:flutter-basics").is_none());
//! ```

use crate::config::DEFAULT_CACHE_TTL_SECS;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Expiring key/value cache
pub struct ExpiringCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ExpiringCache<V> {
    /// Creates an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configured entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Looks up a key
    ///
    /// Returns `None` if the key was never set, was invalidated, or expired.
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };

        if expired {
            entries.remove(key);
            tracing::trace!(key, "Cache entry expired");
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores a value, replacing any previous entry and resetting its age
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.lock().insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Removes a single key
    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Removes every entry
    pub fn invalidate_all(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for ExpiringCache<V> {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}
