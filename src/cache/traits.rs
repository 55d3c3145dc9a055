//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for entities that can be cached.
///
/// Implementors must provide a unique cache key, used to reconcile cached
/// entities against freshly fetched ones.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g., request id)
  fn cache_key(&self) -> &str;

  /// Entity type name for storage organization (e.g., "request")
  fn entity_type() -> &'static str;
}

/// Indicates where the in-memory data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Remote data merged with the local cache
  Network,
  /// Backend reachable but returned nothing usable, serving the local cache
  Cache,
  /// Offline mode - backend unreachable, serving the local cache
  Offline,
}

impl CacheSource {
  pub fn label(&self) -> &'static str {
    match self {
      CacheSource::Network => "live",
      CacheSource::Cache => "cached",
      CacheSource::Offline => "offline",
    }
  }
}
