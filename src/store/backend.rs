// src/store/backend.rs

//! Pluggable key-value backends.
//!
//! Both stores sit on the same [`Backend`] and are kept apart by
//! [`Namespace`], so invalidating (dropping metadata) and deleting data
//! (dropping objects) never touch each other's keys.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;

/// Key namespaces inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Meta,
    Objects,
    Progress,
    /// Bookkeeping shared across runs (the run counter).
    Runs,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Meta,
        Namespace::Objects,
        Namespace::Progress,
        Namespace::Runs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Meta => "meta",
            Namespace::Objects => "objects",
            Namespace::Progress => "progress",
            Namespace::Runs => "runs",
        }
    }
}

/// Abstract key-value storage.
///
/// Implementations must make `put` atomic per key: a reader sees either the
/// previous bytes or the new bytes.
pub trait Backend: Send + Sync + Debug {
    fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, ns: Namespace, key: &str, bytes: &[u8]) -> Result<()>;
    /// Returns `true` if the key existed.
    fn delete(&self, ns: Namespace, key: &str) -> Result<bool>;
    /// All keys in a namespace, sorted.
    fn keys(&self, ns: Namespace) -> Result<Vec<String>>;
    /// Drop every namespace.
    fn clear(&self) -> Result<()>;
}

/// Stores each record as `<root>/<namespace>/<key>.json`.
#[derive(Debug)]
pub struct FileBackend<F: FileSystem> {
    root: PathBuf,
    fs: F,
}

impl<F: FileSystem> FileBackend<F> {
    pub fn new(root: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    fn dir(&self, ns: Namespace) -> PathBuf {
        self.root.join(ns.as_str())
    }

    fn path(&self, ns: Namespace, key: &str) -> PathBuf {
        self.dir(ns).join(format!("{key}.json"))
    }
}

impl<F: FileSystem> Backend for FileBackend<F> {
    fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        self.fs.read(&self.path(ns, key))
    }

    fn put(&self, ns: Namespace, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(ns, key);
        debug!(namespace = ns.as_str(), key, path = ?path, "writing record");
        self.fs.write_atomic(&path, bytes)
    }

    fn delete(&self, ns: Namespace, key: &str) -> Result<bool> {
        self.fs.remove_file(&self.path(ns, key))
    }

    fn keys(&self, ns: Namespace) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .fs
            .read_dir(&self.dir(ns))?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            // Temporary files of in-flight writes start with a dot.
            .filter(|k| !k.starts_with('.'))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> Result<()> {
        debug!(root = ?self.root, "removing store directory");
        self.fs.remove_dir_all(&self.root)
    }
}

/// Mutex-guarded in-memory backend (lost on exit).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<Namespace, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(&ns).and_then(|m| m.get(key)).cloned())
    }

    fn put(&self, ns: Namespace, key: &str, bytes: &[u8]) -> Result<()> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(ns)
            .or_default()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, ns: Namespace, key: &str) -> Result<bool> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get_mut(&ns).and_then(|m| m.remove(key)).is_some())
    }

    fn keys(&self, ns: Namespace) -> Result<Vec<String>> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map
            .get(&ns)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn clear(&self) -> Result<()> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn exercise(backend: &dyn Backend) {
        backend.put(Namespace::Meta, "a", b"meta-a").unwrap();
        backend.put(Namespace::Objects, "a", b"obj-a").unwrap();
        backend.put(Namespace::Objects, "b", b"obj-b").unwrap();

        assert_eq!(backend.get(Namespace::Meta, "a").unwrap().unwrap(), b"meta-a");
        assert_eq!(backend.keys(Namespace::Objects).unwrap(), vec!["a", "b"]);

        assert!(backend.delete(Namespace::Meta, "a").unwrap());
        assert!(!backend.delete(Namespace::Meta, "a").unwrap());
        assert!(backend.get(Namespace::Meta, "a").unwrap().is_none());
        // Namespaces are independent.
        assert!(backend.get(Namespace::Objects, "a").unwrap().is_some());

        backend.clear().unwrap();
        for ns in Namespace::ALL {
            assert!(backend.keys(ns).unwrap().is_empty());
        }
    }

    #[test]
    fn memory_backend_contract() {
        exercise(&MemoryBackend::new());
    }

    #[test]
    fn file_backend_contract_on_mock_fs() {
        exercise(&FileBackend::new("/store", MockFileSystem::new()));
    }

    #[test]
    fn file_backend_contract_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileBackend::new(
            dir.path().join("store"),
            crate::fs::RealFileSystem,
        ));
    }

    #[test]
    fn failed_write_keeps_previous_record() {
        let fs = MockFileSystem::new();
        let backend = FileBackend::new("/store", fs.clone());
        backend.put(Namespace::Meta, "a", b"v1").unwrap();

        fs.set_fail_writes(true);
        assert!(backend.put(Namespace::Meta, "a", b"v2").is_err());
        assert_eq!(backend.get(Namespace::Meta, "a").unwrap().unwrap(), b"v1");
        assert_eq!(fs.file_count(), 1);
    }
}
