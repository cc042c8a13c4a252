//! Named exclusive locks with a bounded wait.
//!
//! One `NamedLocks` instance serialises whole-collection mutations (keyed on
//! the collection's absolute storage path); a second one serialises the
//! writer lifecycle of single sub-indexes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct NamedLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
    timeout: Duration,
}

impl NamedLocks {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self { held: Mutex::new(HashSet::new()), released: Condvar::new(), timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Blocks up to the configured timeout, then fails with `LockTimeout`.
    pub fn acquire(self: &Arc<Self>, name: &Path) -> Result<NamedLockGuard> {
        let key = normalize(name);
        let deadline = Instant::now() + self.timeout;
        let mut held = self.held.lock();
        while held.contains(&key) {
            if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(&key) {
                return Err(Error::LockTimeout { name: key, waited: self.timeout });
            }
        }
        held.insert(key.clone());
        debug!(lock = %key.display(), "lock acquired");
        Ok(NamedLockGuard { locks: Arc::clone(self), key })
    }

    /// Returns `None` instead of waiting when the name is taken.
    pub fn try_acquire(self: &Arc<Self>, name: &Path) -> Option<NamedLockGuard> {
        let key = normalize(name);
        let mut held = self.held.lock();
        if held.contains(&key) {
            return None;
        }
        held.insert(key.clone());
        Some(NamedLockGuard { locks: Arc::clone(self), key })
    }

    fn release(&self, key: &Path) {
        self.held.lock().remove(key);
        self.released.notify_all();
    }
}

fn normalize(name: &Path) -> PathBuf {
    std::path::absolute(name).unwrap_or_else(|_| name.to_path_buf())
}

/// Releases its name on drop.
#[derive(Debug)]
pub struct NamedLockGuard {
    locks: Arc<NamedLocks>,
    key: PathBuf,
}

impl NamedLockGuard {
    pub fn name(&self) -> &Path {
        &self.key
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        self.locks.release(&self.key);
        debug!(lock = %self.key.display(), "lock released");
    }
}
