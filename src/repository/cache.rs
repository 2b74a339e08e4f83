//! Identity cache.
//!
//! Maps a record's primary path to the live object last read or saved for
//! it, plus the serialized fingerprint of its last persisted state. Reading
//! a cached record twice returns the same `Arc`, so all holders observe
//! each other's changes.
//!
//! A cache can be shared between repositories by passing the same
//! `Arc<ObjectCache>` to [`Repository::with_cache`](super::Repository::with_cache).

use crate::{Error, Result};
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

type SharedObject = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
struct CacheEntry {
    item: Option<SharedObject>,
    fingerprint: Option<Vec<u8>>,
}

/// Path-keyed cache of live objects and their fingerprints.
#[derive(Default)]
pub struct ObjectCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl ObjectCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached object for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the cached object is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, path: &Path) -> Result<Option<Arc<T>>> {
        let item = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries.get(path).and_then(|entry| entry.item.clone())
        };

        item.map(|item| {
            item.downcast::<T>().map_err(|_| Error::TypeMismatch {
                path: path.to_path_buf(),
                expected: type_name::<T>(),
            })
        })
        .transpose()
    }

    /// Stores `item` as the live object for `path`.
    ///
    /// Returns `true` if the entry now refers to a different object than
    /// before.
    pub fn set_item<T: Any + Send + Sync>(&self, path: &Path, item: &Arc<T>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(path.to_path_buf()).or_default();

        let same = entry
            .item
            .as_ref()
            .is_some_and(|current| same_object(current, item));
        if !same {
            let shared: SharedObject = Arc::clone(item) as SharedObject;
            entry.item = Some(shared);
        }
        !same
    }

    /// Points an existing entry for `path` at `item`; never creates one.
    ///
    /// Returns `true` if the entry existed and referred to another object.
    pub fn update_item<T: Any + Send + Sync>(&self, path: &Path, item: &Arc<T>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(path) else {
            return false;
        };

        if entry
            .item
            .as_ref()
            .is_some_and(|current| same_object(current, item))
        {
            return false;
        }
        entry.item = Some(Arc::clone(item) as SharedObject);
        true
    }

    /// Stores the fingerprint of the last persisted state of `path`.
    pub fn set_fingerprint(&self, path: &Path, fingerprint: Vec<u8>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(path.to_path_buf()).or_default().fingerprint = Some(fingerprint);
    }

    /// Compares `current` against the stored fingerprint with `equal`.
    ///
    /// Returns `None` when no fingerprint is stored.
    pub fn matches_fingerprint<F>(&self, path: &Path, current: &[u8], equal: F) -> Option<bool>
    where
        F: Fn(&[u8], &[u8]) -> bool,
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(path)
            .and_then(|entry| entry.fingerprint.as_deref())
            .map(|stored| equal(stored, current))
    }

    /// Returns whether anything is cached for `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(path)
    }

    /// Moves the entry of `from` to `to`.
    ///
    /// Any entry at `to` is dropped even when `from` has none, since it
    /// describes files that no longer exist.
    pub fn rekey(&self, from: &Path, to: &Path) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let moved = entries.remove(from);
        entries.remove(to);
        if let Some(entry) = moved {
            entries.insert(to.to_path_buf(), entry);
        }
    }

    /// Removes the entry for `path`; returns whether one existed.
    pub fn remove(&self, path: &Path) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(path).is_some()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    /// Returns `true` if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compares object identity, ignoring the vtable.
fn same_object<T: Any + Send + Sync>(current: &SharedObject, candidate: &Arc<T>) -> bool {
    Arc::as_ptr(current).cast::<()>() == Arc::as_ptr(candidate).cast::<()>()
}
