//! Advisory, marker-file based locks.
//!
//! A lock is held while its marker file exists in the store. File-system stores
//! create the marker exclusively and retry with a fixed delay; in-memory stores
//! make a single attempt.

use std::fmt::Debug;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{trace, warn};

use crate::error::Result;

/// File-name suffix identifying lock markers.
pub const LOCK_EXT: &str = ".lck";

/// Check whether a file name denotes a lock marker.
pub fn is_lock_file(name: &str) -> bool {
    name.ends_with(LOCK_EXT)
}

/// The store-side primitives a [`Lock`] is built on.
pub trait LockBackend: Send + Sync + Debug {
    /// Atomically create `file` if it does not exist. Returns `false` when it
    /// already exists.
    fn create_exclusive(&self, file: &str) -> Result<bool>;

    /// Remove `file` if present.
    fn remove_marker(&self, file: &str) -> Result<()>;

    /// Whether `file` currently exists.
    fn marker_exists(&self, file: &str) -> Result<bool>;
}

/// Retry policy applied by [`Lock::obtain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub retries: u32,
    pub retry_delay: Duration,
}

impl LockPolicy {
    /// A single attempt without waiting.
    pub fn single_shot() -> Self {
        LockPolicy {
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

/// An advisory lock on a named resource within one store.
///
/// Dropping a held lock releases it.
#[derive(Debug)]
pub struct Lock {
    name: String,
    file: String,
    backend: Arc<dyn LockBackend>,
    policy: LockPolicy,
    held: bool,
}

impl Lock {
    pub fn new(
        name: &str,
        prefix: &str,
        backend: Arc<dyn LockBackend>,
        policy: LockPolicy,
    ) -> Self {
        Lock {
            name: name.to_string(),
            file: format!("{prefix}-{name}{LOCK_EXT}"),
            backend,
            policy,
            held: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the marker file backing this lock.
    pub fn file_name(&self) -> &str {
        &self.file
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Try to take the lock, retrying per the store's policy. Returns whether
    /// the lock was obtained.
    pub fn obtain(&mut self) -> Result<bool> {
        if self.held {
            return Ok(true);
        }

        for attempt in 0..=self.policy.retries {
            if self.backend.create_exclusive(&self.file)? {
                self.held = true;
                return Ok(true);
            }
            if attempt < self.policy.retries {
                trace!("lock {} busy, retry {}", self.name, attempt + 1);
                thread::sleep(self.policy.retry_delay);
            }
        }

        warn!(
            "could not obtain lock {} after {} attempts",
            self.name,
            self.policy.retries + 1
        );
        Ok(false)
    }

    /// Release the lock by deleting its marker.
    pub fn release(&mut self) -> Result<()> {
        if self.held {
            self.backend.remove_marker(&self.file)?;
            self.held = false;
        }
        Ok(())
    }

    /// Probe whether anyone holds the lock without taking it.
    pub fn is_locked(&self) -> Result<bool> {
        if self.held {
            return Ok(true);
        }
        if self.backend.create_exclusive(&self.file)? {
            self.backend.remove_marker(&self.file)?;
            Ok(false)
        } else {
            Ok(true)
        }
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release lock {}: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Debug, Default)]
    struct Markers(Mutex<HashSet<String>>);

    impl LockBackend for Markers {
        fn create_exclusive(&self, file: &str) -> Result<bool> {
            Ok(self.0.lock().insert(file.to_string()))
        }

        fn remove_marker(&self, file: &str) -> Result<()> {
            self.0.lock().remove(file);
            Ok(())
        }

        fn marker_exists(&self, file: &str) -> Result<bool> {
            Ok(self.0.lock().contains(file))
        }
    }

    #[test]
    fn test_obtain_release() {
        let backend: Arc<dyn LockBackend> = Arc::new(Markers::default());
        let mut first = Lock::new("write", "glaive", backend.clone(), LockPolicy::single_shot());
        let mut second = Lock::new("write", "glaive", backend.clone(), LockPolicy::single_shot());

        assert_eq!(first.file_name(), "glaive-write.lck");
        assert!(!second.is_locked().unwrap());
        assert!(first.obtain().unwrap());
        assert!(second.is_locked().unwrap());
        assert!(!second.obtain().unwrap());

        first.release().unwrap();
        assert!(!backend.marker_exists("glaive-write.lck").unwrap());
        assert!(second.obtain().unwrap());
    }

    #[test]
    fn test_drop_releases() {
        let backend: Arc<dyn LockBackend> = Arc::new(Markers::default());
        {
            let mut lock = Lock::new("commit", "glaive", backend.clone(), LockPolicy::single_shot());
            assert!(lock.obtain().unwrap());
            assert!(backend.marker_exists("glaive-commit.lck").unwrap());
        }
        assert!(!backend.marker_exists("glaive-commit.lck").unwrap());
    }

    #[test]
    fn test_retries_then_gives_up() {
        let backend: Arc<dyn LockBackend> = Arc::new(Markers::default());
        let mut holder = Lock::new("write", "glaive", backend.clone(), LockPolicy::single_shot());
        assert!(holder.obtain().unwrap());

        let policy = LockPolicy {
            retries: 2,
            retry_delay: Duration::from_millis(1),
        };
        let mut waiter = Lock::new("write", "glaive", backend, policy);
        assert!(!waiter.obtain().unwrap());
        assert!(!waiter.is_held());
        assert!(is_lock_file(waiter.file_name()));
    }
}
