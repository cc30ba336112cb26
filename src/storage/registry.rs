//! Deduplication of file-system stores.
//!
//! Two opens of the same directory through one [`StoreRegistry`] share a single
//! [`FsStore`]. The registry only holds weak references, so a store is closed
//! once its last user drops it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use log::debug;
use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::StoreConfig;
use crate::storage::file::FsStore;

/// A caller-owned table of open file-system stores keyed by canonical path.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: Mutex<AHashMap<PathBuf, Weak<FsStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        StoreRegistry::default()
    }

    /// Open the store for `path`, reusing a live instance when there is one.
    ///
    /// `config` only applies when a new store is created.
    pub fn open<P: AsRef<Path>>(&self, path: P, config: StoreConfig) -> Result<Arc<FsStore>> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        let canonical = path.canonicalize()?;

        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&canonical).and_then(Weak::upgrade) {
            debug!("reusing fs store at {}", canonical.display());
            return Ok(store);
        }

        let store = Arc::new(FsStore::open(&canonical, config)?);
        stores.insert(canonical, Arc::downgrade(&store));
        stores.retain(|_, weak| weak.strong_count() > 0);
        Ok(store)
    }

    /// Number of stores still alive.
    pub fn open_count(&self) -> usize {
        self.stores
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{OutStream, Store};
    use tempfile::TempDir;

    #[test]
    fn test_same_path_shares_store() {
        let temp_dir = TempDir::new().unwrap();
        let registry = StoreRegistry::new();

        let first = registry.open(temp_dir.path(), StoreConfig::default()).unwrap();
        let second = registry
            .open(temp_dir.path().join("."), StoreConfig::default())
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.open_count(), 1);

        let mut out = first.new_output("shared").unwrap();
        out.write_bytes(b"x").unwrap();
        out.close().unwrap();
        assert!(second.exists("shared").unwrap());
    }

    #[test]
    fn test_dropped_store_is_reopened() {
        let temp_dir = TempDir::new().unwrap();
        let registry = StoreRegistry::new();

        let first = registry.open(temp_dir.path(), StoreConfig::default()).unwrap();
        drop(first);
        assert_eq!(registry.open_count(), 0);

        let reopened = registry.open(temp_dir.path(), StoreConfig::default()).unwrap();
        assert_eq!(registry.open_count(), 1);
        assert!(reopened.directory().ends_with(temp_dir.path().file_name().unwrap()));
    }

    #[test]
    fn test_distinct_paths() {
        let temp_dir = TempDir::new().unwrap();
        let registry = StoreRegistry::new();
        let a = registry
            .open(temp_dir.path().join("a"), StoreConfig::default())
            .unwrap();
        let b = registry
            .open(temp_dir.path().join("b"), StoreConfig::default())
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.open_count(), 2);
    }
}
