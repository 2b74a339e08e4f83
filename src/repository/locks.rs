//! Per-path mutual exclusion.
//!
//! Operations on the same primary path are serialized; operations on
//! different paths run in parallel. Lock handles are held weakly so the
//! table only keeps entries for paths with an active holder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Exclusive access to one path, released on drop.
pub(crate) type PathGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub(crate) struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>,
}

impl PathLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn handle(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = locks.get(path).and_then(Weak::upgrade) {
            return handle;
        }

        locks.retain(|_, weak| weak.strong_count() > 0);
        let handle = Arc::new(AsyncMutex::new(()));
        locks.insert(path.to_path_buf(), Arc::downgrade(&handle));
        handle
    }

    /// Blocks the current thread until `path` is free.
    ///
    /// Threads of the runtime's blocking pool may call this.
    ///
    /// # Panics
    ///
    /// Panics when called from a task running on an async runtime worker.
    /// The panic is reported at the caller's location.
    #[track_caller]
    pub(crate) fn lock_blocking(&self, path: &Path) -> PathGuard {
        self.handle(path).blocking_lock_owned()
    }

    /// Waits until `path` is free.
    pub(crate) async fn lock(&self, path: &Path) -> PathGuard {
        self.handle(path).lock_owned().await
    }

    /// Locks two paths in a fixed order so concurrent pairs cannot deadlock.
    ///
    /// Locks once when both paths are equal.
    #[track_caller]
    pub(crate) fn lock_pair_blocking(&self, a: &Path, b: &Path) -> (PathGuard, Option<PathGuard>) {
        if a == b {
            return (self.lock_blocking(a), None);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock_blocking(first);
        let second = self.lock_blocking(second);
        (first, Some(second))
    }

    /// Number of paths with a live lock handle.
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
