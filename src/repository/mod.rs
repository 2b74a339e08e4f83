//! Object repository.
//!
//! [`Repository`] persists serializable objects as individual files under a
//! configured directory, one logical record per name. Saving keeps the last
//! versions in backup slots, deleting can be soft (recoverable) or hard, and
//! read objects are shared through an identity cache with dirty tracking.
//!
//! # Concurrency
//!
//! Operations on the same record are serialized by a per-path lock;
//! different records proceed in parallel. The blocking methods must not be
//! called from an async runtime worker; use the `_async` variants there.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use slotstore::{JsonSerializer, Repository, RepositorySettings};
//!
//! let repo = Repository::new(RepositorySettings::new("/tmp/app"), JsonSerializer)?;
//!
//! let window = repo.read_or_create("window", WindowState::default)?;
//! let mut updated = (*window).clone();
//! updated.width = 1280;
//! if repo.is_dirty(&updated, "window")? {
//!     repo.save(&Arc::new(updated), "window")?;
//! }
//! ```

mod cache;
mod locks;
mod rename;

pub use cache::ObjectCache;

use crate::config::{BackupSettings, RepositorySettings};
use crate::serialization::Serializer;
use crate::storage::{FileLifecycle, GenerationSet, PathResolver, RecordPaths, try_exists};
use crate::{Error, Result};
use locks::PathLocks;
use rename::RenamePlan;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Record name under which [`Repository::open`] persists its settings.
pub const SETTINGS_RECORD: &str = "RepositorySettings";

/// Converts an elapsed duration to milliseconds for metrics.
#[inline]
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// File-per-object repository with backups and an identity cache.
pub struct Repository<S: Serializer> {
    settings: RepositorySettings,
    resolver: PathResolver,
    lifecycle: FileLifecycle,
    serializer: S,
    cache: Arc<ObjectCache>,
    locks: PathLocks,
    closed: AtomicBool,
}

impl<S: Serializer + std::fmt::Debug> std::fmt::Debug for Repository<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("directory", &self.settings.directory)
            .field("serializer", &self.serializer)
            .field("cache", &self.cache)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<S: Serializer> Repository<S> {
    /// Creates a repository with its own cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the settings are invalid, or
    /// [`Error::Io`] if the directory cannot be created.
    pub fn new(settings: RepositorySettings, serializer: S) -> Result<Self> {
        Self::with_cache(settings, serializer, Arc::new(ObjectCache::new()))
    }

    /// Creates a repository that uses `cache`, which may be shared.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_cache(
        settings: RepositorySettings,
        serializer: S,
        cache: Arc<ObjectCache>,
    ) -> Result<Self> {
        let settings = settings.validated()?;
        let policy = settings.naming_policy();

        std::fs::create_dir_all(&policy.directory)
            .map_err(|e| Error::io("create_dir", &policy.directory, e))?;

        Ok(Self {
            lifecycle: FileLifecycle::from_policy(&policy),
            resolver: PathResolver::new(policy),
            settings,
            serializer,
            cache,
            locks: PathLocks::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Creates a repository and persists its settings as the
    /// [`SETTINGS_RECORD`] record if that record does not exist yet.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`], plus any error from saving the settings.
    pub fn open(settings: RepositorySettings, serializer: S) -> Result<Self> {
        let repo = Self::new(settings, serializer)?;
        if !repo.exists(SETTINGS_RECORD)? {
            repo.save(&Arc::new(repo.settings.clone()), SETTINGS_RECORD)?;
            info!(directory = %repo.settings.directory.display(), "Persisted repository settings");
        }
        Ok(repo)
    }

    /// Returns the validated settings.
    #[must_use]
    pub const fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    /// Returns the serializer.
    #[must_use]
    pub const fn serializer(&self) -> &S {
        &self.serializer
    }

    /// Returns the identity cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    /// Resolves `name` to its slot paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if the name cannot be resolved.
    pub fn paths(&self, name: &str) -> Result<RecordPaths> {
        self.resolver.resolve(name)
    }

    /// Returns whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the repository; every later operation fails with
    /// [`Error::Disposed`]. A shared cache is left intact.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(directory = %self.settings.directory.display(), "Closed repository");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    fn open_paths(&self, name: &str) -> Result<RecordPaths> {
        self.ensure_open()?;
        self.resolver.resolve(name)
    }

    fn timestamp_format(&self) -> Option<&str> {
        self.settings
            .backup
            .as_ref()
            .and_then(|b| b.timestamp_format.as_deref())
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Returns whether the record's primary file exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or an I/O error
    /// if the primary file cannot be looked up.
    pub fn exists(&self, name: &str) -> Result<bool> {
        let paths = self.open_paths(name)?;
        try_exists(paths.primary())
    }

    /// Reads a record, returning the cached object when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record has no primary file,
    /// [`Error::TypeMismatch`] if the cached object is another type, or a
    /// serialization or I/O error.
    #[instrument(
        name = "slotstore.repository.read",
        skip(self),
        fields(component = "repository", operation = "read")
    )]
    pub fn read<T>(&self, name: &str) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock_blocking(paths.primary());
        self.read_locked(&paths)
    }

    /// Async variant of [`Self::read`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`].
    #[instrument(
        name = "slotstore.repository.read_async",
        skip(self),
        fields(component = "repository", operation = "read")
    )]
    pub async fn read_async<T>(&self, name: &str) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock(paths.primary()).await;
        if let Some(item) = self.cached::<T>(&paths)? {
            return Ok(item);
        }
        let bytes = self.lifecycle.read_async(paths.primary()).await?;
        self.materialize(&paths, &bytes)
    }

    /// Reads a record, creating and saving it with `create` if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`] except [`Error::NotFound`], plus any error
    /// from saving the new object.
    #[instrument(
        name = "slotstore.repository.read_or_create",
        skip(self, create),
        fields(component = "repository", operation = "read_or_create")
    )]
    pub fn read_or_create<T, F>(&self, name: &str, create: F) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock_blocking(paths.primary());
        match self.read_locked(&paths) {
            Err(Error::NotFound { .. }) => {
                let item = Arc::new(create());
                self.save_locked(&item, &paths)?;
                Ok(item)
            },
            other => other,
        }
    }

    /// Async variant of [`Self::read_or_create`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_or_create`].
    #[instrument(
        name = "slotstore.repository.read_or_create_async",
        skip(self, create),
        fields(component = "repository", operation = "read_or_create")
    )]
    pub async fn read_or_create_async<T, F>(&self, name: &str, create: F) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> T + Send,
    {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock(paths.primary()).await;
        if let Some(item) = self.cached::<T>(&paths)? {
            return Ok(item);
        }
        match self.lifecycle.read_async(paths.primary()).await {
            Ok(bytes) => self.materialize(&paths, &bytes),
            Err(Error::NotFound { .. }) => {
                let item = Arc::new(create());
                self.save_locked_async(&item, &paths).await?;
                Ok(item)
            },
            Err(e) => Err(e),
        }
    }

    fn read_locked<T>(&self, paths: &RecordPaths) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if let Some(item) = self.cached::<T>(paths)? {
            return Ok(item);
        }
        let bytes = self.lifecycle.read(paths.primary())?;
        self.materialize(paths, &bytes)
    }

    fn cached<T>(&self, paths: &RecordPaths) -> Result<Option<Arc<T>>>
    where
        T: Send + Sync + 'static,
    {
        if !self.settings.is_caching {
            return Ok(None);
        }
        self.cache.get::<T>(paths.primary())
    }

    /// Deserializes freshly read bytes and records the object and its
    /// fingerprint.
    fn materialize<T>(&self, paths: &RecordPaths, bytes: &[u8]) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let item: Arc<T> = Arc::new(self.serializer.deserialize(bytes)?);

        if self.settings.is_caching {
            self.cache.set_item(paths.primary(), &item);
        }
        if self.settings.is_tracking_dirty {
            // Re-serialized, so formatting differences in the file do not
            // make a freshly read object dirty.
            let fingerprint = self.serializer.serialize(&*item)?;
            self.cache.set_fingerprint(paths.primary(), fingerprint);
        }

        debug!(path = %paths.primary().display(), bytes = bytes.len(), "Read record");
        Ok(item)
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Saves `item` as the record `name`.
    ///
    /// With backups configured, the previous primary becomes the backup and
    /// the previous backup its soft-deleted copy (or a new timestamped
    /// generation is written), then retention prunes old generations. The
    /// new content replaces the primary atomically.
    ///
    /// # Errors
    ///
    /// Returns a serialization error (nothing on disk is touched) or an
    /// I/O error (the primary keeps its previous content).
    #[instrument(
        name = "slotstore.repository.save",
        skip(self, item),
        fields(component = "repository", operation = "save")
    )]
    pub fn save<T>(&self, item: &Arc<T>, name: &str) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock_blocking(paths.primary());
        self.save_locked(item, &paths)
    }

    /// Async variant of [`Self::save`].
    ///
    /// Dropping the future before it completes leaves the primary with
    /// either its old or its new content.
    ///
    /// # Errors
    ///
    /// Same as [`Self::save`].
    #[instrument(
        name = "slotstore.repository.save_async",
        skip(self, item),
        fields(component = "repository", operation = "save")
    )]
    pub async fn save_async<T>(&self, item: &Arc<T>, name: &str) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock(paths.primary()).await;
        self.save_locked_async(item, &paths).await
    }

    fn save_locked<T>(&self, item: &Arc<T>, paths: &RecordPaths) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let start = Instant::now();
        if self.settings.is_caching {
            // Only an existing entry is updated; a new one waits for the commit.
            self.cache.update_item(paths.primary(), item);
        }

        let bytes = self.serializer.serialize(&**item)?;
        let staged = self.lifecycle.stage(paths.primary(), &bytes)?;
        if let Some(backup) = &self.settings.backup {
            self.take_backup(paths, backup)?;
        }
        staged.commit()?;

        self.record_saved(item, paths, bytes, start);
        Ok(())
    }

    async fn save_locked_async<T>(&self, item: &Arc<T>, paths: &RecordPaths) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let start = Instant::now();
        if self.settings.is_caching {
            // Only an existing entry is updated; a new one waits for the commit.
            self.cache.update_item(paths.primary(), item);
        }

        let bytes = self.serializer.serialize(&**item)?;
        let staged = self.lifecycle.stage_async(paths.primary(), &bytes).await?;
        if let Some(backup) = &self.settings.backup {
            self.take_backup_async(paths, backup).await?;
        }
        staged.commit_async().await?;

        self.record_saved(item, paths, bytes, start);
        Ok(())
    }

    fn record_saved<T>(&self, item: &Arc<T>, paths: &RecordPaths, bytes: Vec<u8>, start: Instant)
    where
        T: Send + Sync + 'static,
    {
        let len = bytes.len();
        if self.settings.is_caching {
            self.cache.set_item(paths.primary(), item);
        }
        if self.settings.is_tracking_dirty {
            self.cache.set_fingerprint(paths.primary(), bytes);
        }

        metrics::counter!("slotstore_saves_total").increment(1);
        metrics::histogram!("slotstore_save_duration_ms").record(elapsed_ms(start));
        debug!(path = %paths.primary().display(), bytes = len, "Saved record");
    }

    fn take_backup(&self, paths: &RecordPaths, backup: &BackupSettings) -> Result<()> {
        let target = backup_target(paths, backup);
        if self.lifecycle.backup(paths.primary(), &target)? {
            let retention = backup.retention();
            if !retention.is_disabled() {
                let generations =
                    GenerationSet::scan(paths, backup.timestamp_format.as_deref())?;
                retention.purge(generations, false);
            }
        }
        Ok(())
    }

    async fn take_backup_async(&self, paths: &RecordPaths, backup: &BackupSettings) -> Result<()> {
        let target = backup_target(paths, backup);
        if !self.lifecycle.backup_async(paths.primary(), &target).await? {
            return Ok(());
        }

        let retention = backup.retention();
        if retention.is_disabled() {
            return Ok(());
        }

        let record = paths.clone();
        let format = backup.timestamp_format.clone();
        tokio::task::spawn_blocking(move || {
            GenerationSet::scan(&record, format.as_deref())
                .map(|generations| retention.purge(generations, false))
        })
        .await
        .map_err(|e| Error::io("purge_backups", paths.backup(), io::Error::other(e)))??;

        Ok(())
    }

    // ========================================================================
    // Dirty tracking and cloning
    // ========================================================================

    /// Returns whether `item` differs from the last persisted state of
    /// `name`. Records never read or saved are dirty. Never touches disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or a
    /// serialization error.
    pub fn is_dirty<T>(&self, item: &T, name: &str) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.is_dirty_with(item, name, |stored, current| stored == current)
    }

    /// Like [`Self::is_dirty`], comparing fingerprints with `equal`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::is_dirty`].
    pub fn is_dirty_with<T, F>(&self, item: &T, name: &str, equal: F) -> Result<bool>
    where
        T: Serialize + ?Sized,
        F: Fn(&[u8], &[u8]) -> bool,
    {
        let paths = self.open_paths(name)?;
        let current = self.serializer.serialize(item)?;
        let unchanged = self
            .cache
            .matches_fingerprint(paths.primary(), &current, equal)
            .unwrap_or(false);
        Ok(!unchanged)
    }

    /// Returns an independent copy of `item`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] or a serialization error.
    pub fn deep_clone<T>(&self, item: &T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        self.ensure_open()?;
        self.serializer.deep_clone(item)
    }

    // ========================================================================
    // Delete and restore
    // ========================================================================

    /// Hard-deletes the primary and its soft-deleted copy, and with
    /// `delete_backups` every backup generation too.
    ///
    /// Returns whether any file was deleted. The cache entry is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or an I/O error.
    #[instrument(
        name = "slotstore.repository.delete",
        skip(self),
        fields(component = "repository", operation = "delete")
    )]
    pub fn delete(&self, name: &str, delete_backups: bool) -> Result<bool> {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock_blocking(paths.primary());

        let mut removed = self.lifecycle.hard_delete(paths.primary())?;
        if delete_backups {
            removed |= self.delete_generations(&paths)?;
        }
        Ok(removed)
    }

    /// Deletes the soft-deleted primary and every backup generation,
    /// leaving the primary untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or an I/O error.
    #[instrument(
        name = "slotstore.repository.delete_backups",
        skip(self),
        fields(component = "repository", operation = "delete_backups")
    )]
    pub fn delete_backups(&self, name: &str) -> Result<bool> {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock_blocking(paths.primary());

        let trashed = self.lifecycle.hard_delete(paths.soft_delete_primary())?;
        let generations = self.delete_generations(&paths)?;
        Ok(trashed || generations)
    }

    fn delete_generations(&self, paths: &RecordPaths) -> Result<bool> {
        let mut removed = self.lifecycle.hard_delete(paths.backup())?;
        let generations = GenerationSet::scan(paths, self.timestamp_format())?;
        for generation in generations.iter().filter(|g| g.is_timestamped()) {
            removed |= self.lifecycle.hard_delete(&generation.path)?;
        }
        Ok(removed)
    }

    /// Soft-deletes the primary into its trash slot.
    ///
    /// Returns `false` if the record has no primary file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or an I/O error.
    #[instrument(
        name = "slotstore.repository.soft_delete",
        skip(self),
        fields(component = "repository", operation = "soft_delete")
    )]
    pub fn soft_delete(&self, name: &str) -> Result<bool> {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock_blocking(paths.primary());
        self.lifecycle.soft_delete(paths.primary())
    }

    /// Restores the record from its soft-deleted copy, or failing that from
    /// its newest backup generation.
    ///
    /// A soft-deleted copy is only restored while no primary exists; if the
    /// record was saved again after the soft delete, nothing is touched and
    /// `false` is returned. When restoring from a backup, a current primary
    /// is soft-deleted first so it stays recoverable. The cache entry is
    /// kept; call [`Self::evict`] to reload the restored content.
    ///
    /// Returns whether anything was restored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or an I/O error.
    #[instrument(
        name = "slotstore.repository.restore",
        skip(self),
        fields(component = "repository", operation = "restore")
    )]
    pub fn restore(&self, name: &str) -> Result<bool> {
        let paths = self.open_paths(name)?;
        let _guard = self.locks.lock_blocking(paths.primary());

        if try_exists(paths.soft_delete_primary())? {
            if try_exists(paths.primary())? {
                // Both copies hold user data; neither may replace the other.
                warn!(
                    path = %paths.primary().display(),
                    "Not restoring: record has both a primary and a soft-deleted copy"
                );
                return Ok(false);
            }
            let restored = self
                .lifecycle
                .restore(paths.primary(), paths.soft_delete_primary())?;
            if restored {
                info!(path = %paths.primary().display(), "Restored soft-deleted record");
            }
            return Ok(restored);
        }

        let generations = GenerationSet::scan(&paths, self.timestamp_format())?;
        let Some(newest) = generations.newest() else {
            return Ok(false);
        };

        self.lifecycle.soft_delete(paths.primary())?;
        let restored = self.lifecycle.restore(paths.primary(), &newest.path)?;
        if restored {
            info!(
                path = %paths.primary().display(),
                from = %newest.path.display(),
                "Restored record from backup"
            );
        }
        Ok(restored)
    }

    /// Lists the record's backup generations, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or an I/O error.
    pub fn backups(&self, name: &str) -> Result<GenerationSet> {
        let paths = self.open_paths(name)?;
        GenerationSet::scan(&paths, self.timestamp_format())
    }

    // ========================================================================
    // Rename
    // ========================================================================

    /// Returns whether `name` can be renamed to `new_name` without
    /// overwriting any file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`], [`Error::InvalidName`], or an I/O error.
    pub fn can_rename(&self, name: &str, new_name: &str) -> Result<bool> {
        let from = self.open_paths(name)?;
        let to = self.resolver.resolve(new_name)?;
        if from.primary() == to.primary() {
            return Ok(true);
        }
        let plan = RenamePlan::build(&from, &to, self.timestamp_format())?;
        Ok(plan.first_collision()?.is_none())
    }

    /// Moves every file of `name` to the matching path of `new_name` and
    /// re-keys the cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WouldOverwrite`] without touching anything if a
    /// destination exists and `overwrite` is false. On an I/O error part-way
    /// the moves already made are reversed.
    #[instrument(
        name = "slotstore.repository.rename",
        skip(self),
        fields(component = "repository", operation = "rename")
    )]
    pub fn rename(&self, name: &str, new_name: &str, overwrite: bool) -> Result<()> {
        let from = self.open_paths(name)?;
        let to = self.resolver.resolve(new_name)?;
        if from.primary() == to.primary() {
            return Ok(());
        }

        let _guards = self.locks.lock_pair_blocking(from.primary(), to.primary());
        let plan = RenamePlan::build(&from, &to, self.timestamp_format())?;
        plan.execute(&self.lifecycle, overwrite)?;
        self.cache.rekey(from.primary(), to.primary());

        metrics::counter!("slotstore_renames_total").increment(1);
        info!(
            from = %from.primary().display(),
            to = %to.primary().display(),
            files = plan.len(),
            "Renamed record"
        );
        Ok(())
    }

    // ========================================================================
    // Cache control
    // ========================================================================

    /// Drops the cache entry for `name`; returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] or [`Error::InvalidName`].
    pub fn evict(&self, name: &str) -> Result<bool> {
        let paths = self.open_paths(name)?;
        Ok(self.cache.remove(paths.primary()))
    }

    /// Drops every cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the repository is closed.
    pub fn clear_cache(&self) -> Result<()> {
        self.ensure_open()?;
        self.cache.clear();
        Ok(())
    }

    // ========================================================================
    // Type-named records
    // ========================================================================

    /// Returns the default record name for `T`: its type name without
    /// module path or generic arguments.
    #[must_use]
    pub fn name_of<T: ?Sized>() -> &'static str {
        let full = type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// [`Self::read`] under [`Self::name_of`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`].
    pub fn read_type<T>(&self) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.read(Self::name_of::<T>())
    }

    /// [`Self::read_or_create`] under [`Self::name_of`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_or_create`].
    pub fn read_or_create_type<T, F>(&self, create: F) -> Result<Arc<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.read_or_create(Self::name_of::<T>(), create)
    }

    /// [`Self::save`] under [`Self::name_of`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::save`].
    pub fn save_type<T>(&self, item: &Arc<T>) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.save(item, Self::name_of::<T>())
    }

    /// [`Self::is_dirty`] under [`Self::name_of`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::is_dirty`].
    pub fn is_dirty_type<T: Serialize>(&self, item: &T) -> Result<bool> {
        self.is_dirty(item, Self::name_of::<T>())
    }
}

/// Where the next backup of `paths` goes.
fn backup_target(paths: &RecordPaths, backup: &BackupSettings) -> PathBuf {
    backup.timestamp_format.as_deref().map_or_else(
        || paths.backup().to_path_buf(),
        |format| paths.timestamped_backup(&chrono::Local::now().format(format).to_string()),
    )
}
