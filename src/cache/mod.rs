//! Local cache for offline support.
//!
//! Entities are persisted as one serialized list per cache key. Every write
//! replaces the whole list, so the stored value always matches what the caller
//! holds in memory after a mutation.

mod layer;
mod storage;
mod traits;

pub use layer::{merge_by_key, CacheLayer};
pub use storage::{CacheBackend, CacheStorage, CachedList, MemoryStorage, SqliteStorage};
pub use traits::{CacheSource, Cacheable};
