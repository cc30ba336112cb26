//! Byte-store abstraction.
//!
//! A [`Store`] maps file names to immutable byte content. Files are written once
//! through an [`OutStream`] and become readable, through any number of
//! independent [`InStream`] cursors, once the output is closed. Three backends
//! are provided:
//!
//! - [`file::FsStore`]: one regular OS file per name, deduplicated per
//!   directory by a [`registry::StoreRegistry`]
//! - [`memory::RamStore`]: in-memory files made of fixed-size buffers
//! - [`compound::CompoundStore`]: a read-only view over a single archive file
//!   produced by [`compound::CompoundWriter`]
//!
//! # Example
//!
//! ```
//! use glaive::storage::memory::RamStore;
//! use glaive::storage::{InStream, OutStream, Store, StoreConfig};
//!
//! # fn main() -> glaive::error::Result<()> {
//! let store = RamStore::new(StoreConfig::default());
//!
//! let mut output = store.new_output("segments")?;
//! output.write_vint(42)?;
//! output.write_string("hello")?;
//! output.close()?;
//!
//! let mut input = store.open_input("segments")?;
//! assert_eq!(input.read_vint()?, 42);
//! assert_eq!(input.read_string()?, "hello");
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod compound;
pub mod file;
pub mod lock;
pub mod memory;
pub mod registry;
pub mod stream;

pub use lock::Lock;
pub use stream::{InStream, OutStream};

/// Configuration shared by the store backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Buffer size for stream I/O and in-memory file chunks.
    pub buffer_size: usize,

    /// Number of additional attempts made when a lock is busy.
    pub lock_retries: u32,

    /// Delay between lock attempts in milliseconds.
    pub lock_retry_delay_ms: u64,

    /// Prefix of lock marker file names.
    pub lock_prefix: String,

    /// Serve file-system inputs from memory maps.
    pub use_mmap: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            buffer_size: 1024,
            lock_retries: 5,
            lock_retry_delay_ms: 100,
            lock_prefix: "glaive".to_string(),
            use_mmap: false,
        }
    }
}

impl StoreConfig {
    /// Load a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn lock_policy(&self) -> lock::LockPolicy {
        lock::LockPolicy {
            retries: self.lock_retries,
            retry_delay: std::time::Duration::from_millis(self.lock_retry_delay_ms),
        }
    }
}

/// A named collection of write-once byte files.
pub trait Store: Send + Sync + Debug {
    /// Create `name` as an empty file if it does not exist.
    fn touch(&self, name: &str) -> Result<()>;

    fn exists(&self, name: &str) -> Result<bool>;

    /// Delete `name`. Returns whether a file was removed.
    fn remove(&self, name: &str) -> Result<bool>;

    /// Rename `from` to `to`, replacing any existing `to`.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Number of files, lock markers excluded.
    fn count(&self) -> Result<usize>;

    /// Visit every file name, lock markers excluded.
    fn each(&self, visit: &mut dyn FnMut(&str)) -> Result<()>;

    /// Remove every lock marker.
    fn clear_locks(&self) -> Result<()>;

    /// Remove every file except lock markers.
    fn clear(&self) -> Result<()>;

    /// Remove every file including lock markers.
    fn clear_all(&self) -> Result<()>;

    /// Length of `name` in bytes.
    fn length(&self, name: &str) -> Result<u64>;

    fn new_output(&self, name: &str) -> Result<Box<dyn OutStream>>;

    fn open_input(&self, name: &str) -> Result<Box<dyn InStream>>;

    fn open_lock(&self, name: &str) -> Result<Lock>;

    /// Sorted list of file names, lock markers excluded.
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.each(&mut |name| names.push(name.to_string()))?;
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::RamStore;

    #[test]
    fn test_config_defaults_and_json() {
        let config = StoreConfig::default();
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.lock_retries, 5);
        assert_eq!(config.lock_retry_delay_ms, 100);
        assert!(!config.use_mmap);

        let config =
            StoreConfig::from_json_str(r#"{"lock_retries": 1, "use_mmap": true}"#).unwrap();
        assert_eq!(config.lock_retries, 1);
        assert!(config.use_mmap);
        assert_eq!(config.buffer_size, 1024);

        assert!(StoreConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_list_via_trait_object() {
        let store: Box<dyn Store> = Box::new(RamStore::new(StoreConfig::default()));
        store.touch("b").unwrap();
        store.touch("a").unwrap();
        let mut lock = store.open_lock("write").unwrap();
        assert!(lock.obtain().unwrap());

        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.count().unwrap(), 2);
    }
}
