//! Cache layer that wraps a storage backend with typed, write-through access.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::Cacheable;

/// Cache layer that manages typed reads and write-through persistence.
///
/// Storage failures never propagate from here: a failed read is treated as an
/// empty cache and a failed write is logged. The in-memory state held by the
/// caller stays authoritative either way. After a failed read, writes are
/// refused until a later read succeeds, so unreadable data is never replaced.
pub struct CacheLayer<S: CacheStorage> {
  storage: S,
  unreadable: AtomicBool,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage,
      unreadable: AtomicBool::new(false),
    }
  }

  /// Read the list stored under `key`. Absent or unreadable lists read as empty.
  pub fn load<T: Cacheable>(&self, key: &str) -> Vec<T> {
    match self.storage.get_list::<T>(key) {
      Ok(Some(cached)) => {
        self.unreadable.store(false, Ordering::SeqCst);
        debug!(
          key,
          count = cached.entities.len(),
          cached_at = %cached.cached_at,
          "loaded cached list"
        );
        cached.entities
      }
      Ok(None) => {
        self.unreadable.store(false, Ordering::SeqCst);
        Vec::new()
      }
      Err(e) => {
        self.unreadable.store(true, Ordering::SeqCst);
        warn!(key, error = %e, "failed to read cache, treating as empty");
        Vec::new()
      }
    }
  }

  /// Whether the last read failed
  pub fn is_unreadable(&self) -> bool {
    self.unreadable.load(Ordering::SeqCst)
  }

  /// Persist the entire list under `key`.
  pub fn write_through<T: Cacheable>(&self, key: &str, entities: &[T]) {
    if self.is_unreadable() {
      warn!(key, count = entities.len(), "cache unreadable, keeping stored data");
      return;
    }
    if let Err(e) = self.storage.store_list(key, entities) {
      warn!(key, error = %e, "failed to write cache");
    }
  }
}

/// Union two lists keyed by `cache_key`.
///
/// Every authoritative entity is kept (first occurrence wins on duplicate keys),
/// followed by each local entity whose key is not already present. Applying the
/// same merge twice yields the same list.
pub fn merge_by_key<T: Cacheable>(authoritative: Vec<T>, local: Vec<T>) -> Vec<T> {
  let mut seen: HashSet<String> = HashSet::new();
  let mut merged = Vec::with_capacity(authoritative.len() + local.len());

  for entity in authoritative.into_iter().chain(local) {
    if seen.insert(entity.cache_key().to_string()) {
      merged.push(entity);
    }
  }

  merged
}
