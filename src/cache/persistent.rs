//! Persistent cross-process store for remote verdicts.
//!
//! Redis-shaped contract: `get(key) -> json | None`, `set(key, json, ttl)`.
//! The store only holds recomputable data, so callers treat any error as a
//! miss. [`RedbKvStore`] survives restarts and is shared across processes;
//! [`MemoryKvStore`] is the in-memory equivalent.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Table of cache entries (string keys → JSON-encoded [`StoredValue`]).
const CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("remote_cache");

/// Key-value store with per-entry expiry.
pub trait KvStore: Send + Sync {
    /// Read a live value. Expired values read as `None`.
    fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>>;

    /// Write a value that expires after `ttl_secs`.
    fn set(&self, key: &str, value: &serde_json::Value, ttl_secs: u64) -> StoreResult<()>;
}

/// Value plus absolute expiry, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    expires_at: u64,
    value: serde_json::Value,
}

impl StoredValue {
    fn new(value: serde_json::Value, ttl_secs: u64) -> Self {
        Self {
            expires_at: now_secs().saturating_add(ttl_secs),
            value,
        }
    }

    fn is_live(&self) -> bool {
        now_secs() < self.expires_at
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ── redb ────────────────────────────────────────────────────────────────

/// ACID-durable store using redb.
pub struct RedbKvStore {
    db: Arc<Database>,
}

impl RedbKvStore {
    /// Open or create the store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("darija-cache.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Delete expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let removed = {
            let mut table = txn.open_table(CACHE_TABLE).map_err(redb_err("open_table"))?;
            let mut stale = Vec::new();
            for row in table.iter().map_err(redb_err("iter"))? {
                let (key, value) = row.map_err(redb_err("iter"))?;
                let live = serde_json::from_slice::<StoredValue>(value.value())
                    .map(|v| v.is_live())
                    .unwrap_or(false);
                if !live {
                    stale.push(key.value().to_string());
                }
            }
            for key in &stale {
                table.remove(key.as_str()).map_err(redb_err("remove"))?;
            }
            stale.len()
        };
        txn.commit().map_err(redb_err("commit"))?;
        Ok(removed)
    }
}

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl Fn(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

impl KvStore for RedbKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = match txn.open_table(CACHE_TABLE) {
            Ok(t) => t,
            // Nothing written yet.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(redb_err("open_table")(e)),
        };
        let Some(guard) = table.get(key).map_err(redb_err("get"))? else {
            return Ok(None);
        };
        let stored: StoredValue =
            serde_json::from_slice(guard.value()).map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        Ok(stored.is_live().then_some(stored.value))
    }

    fn set(&self, key: &str, value: &serde_json::Value, ttl_secs: u64) -> StoreResult<()> {
        let bytes = serde_json::to_vec(&StoredValue::new(value.clone(), ttl_secs)).map_err(|e| {
            StoreError::Serialization {
                message: e.to_string(),
            }
        })?;
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(CACHE_TABLE).map_err(redb_err("open_table"))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(redb_err("insert"))?;
        }
        txn.commit().map_err(redb_err("commit"))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore").finish()
    }
}

// ── in-memory ───────────────────────────────────────────────────────────

/// Concurrent in-memory store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        let live = self
            .entries
            .get(key)
            .map(|entry| entry.is_live().then(|| entry.value.clone()));
        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &serde_json::Value, ttl_secs: u64) -> StoreResult<()> {
        self.entries
            .insert(key.to_string(), StoredValue::new(value.clone(), ttl_secs));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn redb_set_get() {
        let dir = TempDir::new().unwrap();
        let store = RedbKvStore::open(dir.path()).unwrap();

        assert_eq!(store.get("missing").unwrap(), None);
        store
            .set("k", &json!({"language": "darija", "confidence": 0.9}), 60)
            .unwrap();
        assert_eq!(
            store.get("k").unwrap(),
            Some(json!({"language": "darija", "confidence": 0.9}))
        );
    }

    #[test]
    fn redb_overwrite_value() {
        let dir = TempDir::new().unwrap();
        let store = RedbKvStore::open(dir.path()).unwrap();
        store.set("k", &json!(1), 60).unwrap();
        store.set("k", &json!(2), 60).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn redb_zero_ttl_is_expired_and_purged() {
        let dir = TempDir::new().unwrap();
        let store = RedbKvStore::open(dir.path()).unwrap();
        store.set("gone", &json!("x"), 0).unwrap();
        store.set("kept", &json!("y"), 3600).unwrap();
        assert_eq!(store.get("gone").unwrap(), None);
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.get("kept").unwrap(), Some(json!("y")));
    }

    #[test]
    fn redb_persists_across_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let store = RedbKvStore::open(dir.path()).unwrap();
            store.set("persist", &json!([1, 2, 3]), 3600).unwrap();
        }
        let store = RedbKvStore::open(dir.path()).unwrap();
        assert_eq!(store.get("persist").unwrap(), Some(json!([1, 2, 3])));
    }

    #[test]
    fn memory_store_expires_lazily() {
        let store = MemoryKvStore::new();
        store.set("a", &json!(true), 0).unwrap();
        store.set("b", &json!(false), 3600).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("b").unwrap(), Some(json!(false)));
    }

    #[test]
    fn stores_are_object_safe() {
        let stores: Vec<Box<dyn KvStore>> = vec![Box::new(MemoryKvStore::new())];
        for s in &stores {
            s.set("x", &json!(1), 10).unwrap();
            assert!(s.get("x").unwrap().is_some());
        }
    }
}
