//! Key cache implementation
//!
//! HashMap-based cache with a single Mutex for all operations.

use std::collections::HashMap;

use parking_lot::Mutex;
use zeroize::Zeroize;

use crate::buffer::{KeyId, SecretBuffer};
use crate::error::{KeywardError, Result};

use super::KeyLoader;

/// Bounded cache of key material keyed by identifier
///
/// ## Concurrency:
/// - `entries`: one Mutex held for the full duration of every operation,
///   backend loads included, so two workers racing to add the same new
///   identifier produce exactly one entry and one load
/// - All methods use `&self`; share the cache through an `Arc`
pub struct KeyCache {
    /// Cached key material, exclusively owned by the cache
    entries: Mutex<HashMap<KeyId, SecretBuffer>>,

    /// Max number of entries
    capacity: usize,

    /// Backend used on a cache miss
    loader: Box<dyn KeyLoader>,
}

impl KeyCache {
    /// Create an empty cache bounded to `capacity` entries
    pub fn new(capacity: usize, loader: impl KeyLoader + 'static) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            loader: Box::new(loader),
        }
    }

    /// Return a copy of the key material for `id`, loading it on a miss.
    ///
    /// A miss behaves exactly like [`KeyCache::add`].
    pub fn lookup(&self, id: &KeyId) -> Result<SecretBuffer> {
        let mut entries = self.entries.lock();

        if let Some(key) = entries.get(id) {
            tracing::trace!("Key cache hit for {}", id);
            return Ok(key.clone());
        }

        tracing::debug!("Key cache miss for {}, loading", id);
        self.load_locked(&mut entries, id)
    }

    /// Load and insert the key for `id`, returning a copy of it.
    ///
    /// Re-adding a cached identifier succeeds and returns the existing
    /// material without reloading it.
    pub fn add(&self, id: &KeyId) -> Result<SecretBuffer> {
        let mut entries = self.entries.lock();

        if let Some(key) = entries.get(id) {
            tracing::debug!("Key {} already cached", id);
            return Ok(key.clone());
        }

        self.load_locked(&mut entries, id)
    }

    /// Called with the lock held and `id` known to be absent
    fn load_locked(
        &self,
        entries: &mut HashMap<KeyId, SecretBuffer>,
        id: &KeyId,
    ) -> Result<SecretBuffer> {
        if entries.len() >= self.capacity {
            tracing::warn!("Key cache full ({} entries), rejecting {}", self.capacity, id);
            return Err(KeywardError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let key = self.loader.load_key(id)?;
        let copy = key.clone();
        entries.insert(id.clone(), key);

        tracing::debug!("Key {} added to cache ({} entries)", id, entries.len());
        Ok(copy)
    }

    /// Remove and erase the entry for `id`
    pub fn delete(&self, id: &KeyId) -> Result<()> {
        let mut entries = self.entries.lock();

        match entries.remove(id) {
            // Dropping the buffer zeroes it
            Some(_) => {
                tracing::debug!("Key {} removed from cache", id);
                Ok(())
            }
            None => Err(KeywardError::KeyNotFound),
        }
    }

    /// Remove and erase every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();

        for (_, mut key) in entries.drain() {
            key.zeroize();
        }
        entries.shrink_to_fit();

        removed
    }

    /// Erase all entries and release the backing store.
    ///
    /// Consumes the cache, so it can only happen once per construction.
    pub fn destroy(self) -> Result<()> {
        let removed = self.clear();
        tracing::debug!("Key cache destroyed ({} entries erased)", removed);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether `id` is cached (never triggers a load)
    pub fn contains(&self, id: &KeyId) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
