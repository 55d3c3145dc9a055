//! Cache storage trait with SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use super::traits::Cacheable;

/// A cached list lookup.
#[derive(Debug, Clone)]
pub struct CachedList<T> {
  /// The cached entities in stored order
  pub entities: Vec<T>,
  /// When the list was last written
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Lists are always written whole; there are no partial updates.
pub trait CacheStorage: Send + Sync {
  /// Replace the list stored under `key`.
  fn store_list<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()>;

  /// Get the list stored under `key`, if any.
  fn get_list<T: Cacheable>(&self, key: &str) -> Result<Option<CachedList<T>>>;
}

/// In-memory storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  lists: Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl MemoryStorage {
  /// Store raw bytes under `key`, bypassing serialization.
  #[cfg(test)]
  pub fn insert_raw(&self, key: &str, data: &[u8]) {
    if let Ok(mut lists) = self.lists.lock() {
      lists.insert(key.to_string(), (data.to_vec(), Utc::now()));
    }
  }
}

impl CacheStorage for MemoryStorage {
  fn store_list<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()> {
    let data =
      serde_json::to_vec(entities).map_err(|e| eyre!("Failed to serialize list: {}", e))?;
    let mut lists = self
      .lists
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    lists.insert(key.to_string(), (data, Utc::now()));
    Ok(())
  }

  fn get_list<T: Cacheable>(&self, key: &str) -> Result<Option<CachedList<T>>> {
    let lists = self
      .lists
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    match lists.get(key) {
      Some((data, cached_at)) => {
        Ok(Some(CachedList {
          entities: decode_entities(key, data)?,
          cached_at: *cached_at,
        }))
      }
      None => Ok(None),
    }
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pawdesk").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One serialized JSON array per key
CREATE TABLE IF NOT EXISTS list_cache (
    cache_key TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    data BLOB NOT NULL,
    item_count INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl CacheStorage for SqliteStorage {
  fn store_list<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data =
      serde_json::to_vec(entities).map_err(|e| eyre!("Failed to serialize list: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO list_cache (cache_key, entity_type, data, item_count, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![key, T::entity_type(), data, entities.len()],
      )
      .map_err(|e| eyre!("Failed to store list {}: {}", key, e))?;

    Ok(())
  }

  fn get_list<T: Cacheable>(&self, key: &str) -> Result<Option<CachedList<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT data, cached_at FROM list_cache
         WHERE cache_key = ? AND entity_type = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let result: Option<(Vec<u8>, String)> = stmt
      .query_row(params![key, T::entity_type()], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .ok();

    match result {
      Some((data, cached_at_str)) => {
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedList {
          entities: decode_entities(key, &data)?,
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }
}

/// Storage chosen at startup: persistent by default, in-memory for throwaway sessions.
pub enum CacheBackend {
  Sqlite(SqliteStorage),
  Memory(MemoryStorage),
}

impl CacheStorage for CacheBackend {
  fn store_list<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()> {
    match self {
      CacheBackend::Sqlite(s) => s.store_list(key, entities),
      CacheBackend::Memory(s) => s.store_list(key, entities),
    }
  }

  fn get_list<T: Cacheable>(&self, key: &str) -> Result<Option<CachedList<T>>> {
    match self {
      CacheBackend::Sqlite(s) => s.get_list(key),
      CacheBackend::Memory(s) => s.get_list(key),
    }
  }
}

/// Decode a stored JSON array one entity at a time.
///
/// Entities that no longer deserialize are skipped so one bad record does not
/// hide the rest of the list. Only a blob that is not a JSON array fails.
fn decode_entities<T: Cacheable>(key: &str, data: &[u8]) -> Result<Vec<T>> {
  let raw: Vec<serde_json::Value> =
    serde_json::from_slice(data).map_err(|e| eyre!("Failed to deserialize list: {}", e))?;

  let total = raw.len();
  let entities: Vec<T> = raw
    .into_iter()
    .enumerate()
    .filter_map(|(index, value)| match serde_json::from_value(value) {
      Ok(entity) => Some(entity),
      Err(e) => {
        warn!(key, index, error = %e, "skipping unreadable cached entity");
        None
      }
    })
    .collect();

  if entities.len() < total {
    warn!(key, kept = entities.len(), total, "cached list had unreadable entities");
  }
  Ok(entities)
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
