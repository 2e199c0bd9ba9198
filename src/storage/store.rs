//! Record store: key/value persistence with a byte quota.
//!
//! The store is a transactional key-value surface: concurrent reads,
//! serialized writes, enumerable keys, and a hard capacity that rejects
//! writes with `QuotaExceeded` rather than silently truncating. Two
//! implementations are provided: an in-memory store for tests and a
//! JSON-file-per-key directory store with crash-safe atomic writes.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{ZoomcastError, ZoomcastResult};

/// Key/value persistence with a byte quota and key enumeration.
pub trait RecordStore: Send + Sync + 'static {
    /// Read a value. `Ok(None)` when the key does not exist.
    fn get(&self, key: &str) -> ZoomcastResult<Option<Vec<u8>>>;

    /// Write a value, replacing any existing one. Fails with
    /// `QuotaExceeded` when the write would push usage past capacity.
    fn put(&self, key: &str, value: &[u8]) -> ZoomcastResult<()>;

    /// Delete a key. Returns whether the key existed.
    fn delete(&self, key: &str) -> ZoomcastResult<bool>;

    /// All keys currently present, in unspecified order.
    fn keys(&self) -> ZoomcastResult<Vec<String>>;

    /// Total bytes currently in use.
    fn usage_bytes(&self) -> ZoomcastResult<u64>;

    /// Hard capacity in bytes.
    fn capacity_bytes(&self) -> u64;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Volatile store for tests and ephemeral runs.
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, Vec<u8>>>,
    capacity: u64,
}

impl MemoryRecordStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            capacity,
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, key: &str) -> ZoomcastResult<Option<Vec<u8>>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> ZoomcastResult<()> {
        let mut records = self.records.write();
        let existing = records.get(key).map(|v| v.len() as u64).unwrap_or(0);
        let used: u64 = records.values().map(|v| v.len() as u64).sum();
        let projected = used - existing + value.len() as u64;
        if projected > self.capacity {
            return Err(ZoomcastError::QuotaExceeded {
                used,
                capacity: self.capacity,
            });
        }
        records.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> ZoomcastResult<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn keys(&self) -> ZoomcastResult<Vec<String>> {
        Ok(self.records.read().keys().cloned().collect())
    }

    fn usage_bytes(&self) -> ZoomcastResult<u64> {
        Ok(self.records.read().values().map(|v| v.len() as u64).sum())
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity
    }
}

// ============================================================================
// Filesystem Store
// ============================================================================

/// Directory-backed store, one JSON file per key.
///
/// Writes go through a temp file + rename so a crash mid-write never leaves
/// a torn record behind.
pub struct FsRecordStore {
    dir: PathBuf,
    capacity: u64,
    write_lock: RwLock<()>,
}

impl FsRecordStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, capacity: u64) -> ZoomcastResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            capacity,
            write_lock: RwLock::new(()),
        })
    }

    /// Open a store under the platform data directory (`<data>/zoomcast`).
    pub fn open_default(capacity: u64) -> ZoomcastResult<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| ZoomcastError::Other("no platform data directory".to_string()))?;
        Self::open(base.join("zoomcast"), capacity)
    }

    fn path_for(&self, key: &str) -> ZoomcastResult<PathBuf> {
        // Keys are generated internally; reject anything that could escape
        // the store directory.
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ZoomcastError::Other(format!("invalid record key: {}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Atomically write bytes to a file: temp file, fsync, rename, then
    /// fsync the parent directory for durability.
    fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let temp_path = path.with_extension("json.tmp");

        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, path)?;

        if let Some(parent) = path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    fn dir_usage(&self) -> ZoomcastResult<u64> {
        let mut size = 0u64;
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(metadata) = std::fs::metadata(&path) {
                    size += metadata.len();
                }
            }
        }
        Ok(size)
    }
}

impl RecordStore for FsRecordStore {
    fn get(&self, key: &str) -> ZoomcastResult<Option<Vec<u8>>> {
        let _guard = self.write_lock.read();
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> ZoomcastResult<()> {
        let _guard = self.write_lock.write();
        let path = self.path_for(key)?;

        let existing = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let used = self.dir_usage()?;
        let projected = used - existing.min(used) + value.len() as u64;
        if projected > self.capacity {
            return Err(ZoomcastError::QuotaExceeded {
                used,
                capacity: self.capacity,
            });
        }

        Self::atomic_write(&path, value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> ZoomcastResult<bool> {
        let _guard = self.write_lock.write();
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> ZoomcastResult<Vec<String>> {
        let _guard = self.write_lock.read();
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        Ok(keys)
    }

    fn usage_bytes(&self) -> ZoomcastResult<u64> {
        let _guard = self.write_lock.read();
        self.dir_usage()
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryRecordStore::new(1024);
        assert_eq!(store.get("a").unwrap(), None);

        store.put("a", b"hello").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(store.usage_bytes().unwrap(), 5);

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.usage_bytes().unwrap(), 0);
    }

    #[test]
    fn test_memory_store_quota_enforced() {
        let store = MemoryRecordStore::new(10);
        store.put("a", b"12345").unwrap();

        let err = store.put("b", b"123456").unwrap_err();
        assert!(matches!(err, ZoomcastError::QuotaExceeded { .. }));

        // Replacing an existing key accounts for the freed bytes.
        store.put("a", b"1234567890").unwrap();
    }

    #[test]
    fn test_memory_store_key_enumeration() {
        let store = MemoryRecordStore::new(1024);
        store.put("project_1", b"{}").unwrap();
        store.put("blob_1_0", b"{}").unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["blob_1_0", "project_1"]);
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = std::env::temp_dir().join(format!(
            "zoomcast-store-test-{}-{}",
            std::process::id(),
            rand::random::<u32>()
        ));
        let store = FsRecordStore::open(&dir, 4096).unwrap();

        store.put("project_abc", b"{\"id\":\"abc\"}").unwrap();
        assert_eq!(
            store.get("project_abc").unwrap().as_deref(),
            Some(&b"{\"id\":\"abc\"}"[..])
        );
        assert_eq!(store.keys().unwrap(), vec!["project_abc"]);
        assert!(store.usage_bytes().unwrap() > 0);

        assert!(store.delete("project_abc").unwrap());
        assert_eq!(store.get("project_abc").unwrap(), None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_fs_store_rejects_path_traversal_keys() {
        let dir = std::env::temp_dir().join(format!(
            "zoomcast-store-test-{}-{}",
            std::process::id(),
            rand::random::<u32>()
        ));
        let store = FsRecordStore::open(&dir, 4096).unwrap();

        assert!(store.put("../evil", b"x").is_err());
        assert!(store.put("", b"x").is_err());
        assert!(store.get("a/b").is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
