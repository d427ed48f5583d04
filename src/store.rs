//! Whole-file key→value tables for activation bookkeeping.
//!
//! Each table is one JSON document rewritten in full on every mutation,
//! through a temp file and an atomic rename so a crash never leaves a
//! truncated table behind. Within a process the in-memory map is guarded
//! by a mutex; across processes the files are last-writer-wins, which is
//! an accepted weakness of the single-user-per-install deployment model.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// A persistent string map stored as a single JSON file.
#[derive(Debug)]
pub struct Table {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

/// Result of a compare-and-set bind on a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// No prior binding existed; this one was recorded.
    Created,
    /// A binding already existed; carries the recorded owner.
    AlreadyBound(String),
}

impl Table {
    /// Opens the table, loading the current file contents. A missing or
    /// unreadable file reads as an empty table.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load(&path);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Inserts or overwrites an entry and rewrites the file.
    pub fn put(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), value.to_string());
        persist(&self.path, &entries)
    }

    /// Records `machine` for `key` unless a binding already exists. The
    /// existing owner wins; it is never overwritten.
    pub fn try_bind(&self, key: &str, machine: &str) -> io::Result<BindOutcome> {
        let mut entries = self.lock();
        if let Some(owner) = entries.get(key) {
            return Ok(BindOutcome::AlreadyBound(owner.clone()));
        }
        entries.insert(key.to_string(), machine.to_string());
        persist(&self.path, &entries)?;
        Ok(BindOutcome::Created)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The validator-side pair of tables: the activation lock and its
/// mirrored registry, both keyed by the original-key fingerprint.
#[derive(Debug)]
pub struct LockStore {
    lock: Table,
    registry: Table,
}

impl LockStore {
    pub fn open(lock_path: impl Into<PathBuf>, registry_path: impl Into<PathBuf>) -> Self {
        Self {
            lock: Table::open(lock_path),
            registry: Table::open(registry_path),
        }
    }

    /// The machine a key is locally recorded as bound to, if any. The
    /// registry is primary; the lock table is the safety net.
    pub fn owner(&self, key_fingerprint: &str) -> Option<String> {
        self.registry
            .get(key_fingerprint)
            .or_else(|| self.lock.get(key_fingerprint))
    }

    /// Records the binding in both tables.
    pub fn record(&self, key_fingerprint: &str, machine: &str) -> io::Result<()> {
        self.registry.put(key_fingerprint, machine)?;
        self.lock.put(key_fingerprint, machine)
    }
}

fn load(path: &Path) -> HashMap<String, String> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

fn persist(path: &Path, entries: &HashMap<String, String>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(entries).map_err(io::Error::other)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_get_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.json");

        let table = Table::open(&path);
        assert_eq!(table.get("k"), None);
        table.put("k", "v").unwrap();
        assert_eq!(table.get("k"), Some("v".to_string()));

        let reopened = Table::open(&path);
        assert_eq!(reopened.get("k"), Some("v".to_string()));
    }

    #[test]
    fn try_bind_is_first_writer_wins() {
        let dir = TempDir::new().unwrap();
        let table = Table::open(dir.path().join("table.json"));

        assert_eq!(table.try_bind("fp", "m1").unwrap(), BindOutcome::Created);
        assert_eq!(
            table.try_bind("fp", "m2").unwrap(),
            BindOutcome::AlreadyBound("m1".to_string())
        );
        assert_eq!(table.get("fp"), Some("m1".to_string()));
    }

    #[test]
    fn garbage_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.json");
        std::fs::write(&path, "{ not json").unwrap();
        let table = Table::open(&path);
        assert_eq!(table.get("anything"), None);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.json");
        let table = Table::open(&path);
        table.put("a", "1").unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn lock_store_mirrors_both_tables() {
        let dir = TempDir::new().unwrap();
        let store = LockStore::open(dir.path().join("l.lock"), dir.path().join("r.registry"));
        assert_eq!(store.owner("fp"), None);
        store.record("fp", "m1").unwrap();
        assert_eq!(store.owner("fp"), Some("m1".to_string()));

        // A record surviving in only one table still answers lookups.
        let registry_only = LockStore::open(dir.path().join("gone.lock"), dir.path().join("r.registry"));
        assert_eq!(registry_only.owner("fp"), Some("m1".to_string()));
    }
}
