//! File lifecycle primitives.
//!
//! Every primitive operates on concrete paths and is a no-op when its source
//! file is absent, so callers need not check first. A lookup that fails for
//! any other reason is an error. Replacing a file's content always goes
//! through a temporary sibling and a rename: a crash leaves either the old
//! or the new content, never a torn file.

use super::paths::{NamingPolicy, with_appended_extension};
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Save, delete, backup and restore primitives.
#[derive(Debug, Clone)]
pub struct FileLifecycle {
    trash_suffix: String,
    temp_extension: String,
}

impl FileLifecycle {
    /// Creates the primitives for the given markers.
    #[must_use]
    pub fn new(trash_suffix: impl Into<String>, temp_extension: impl Into<String>) -> Self {
        Self {
            trash_suffix: trash_suffix.into(),
            temp_extension: temp_extension.into(),
        }
    }

    /// Creates the primitives for a naming policy.
    #[must_use]
    pub fn from_policy(policy: &NamingPolicy) -> Self {
        Self::new(policy.trash_suffix.clone(), policy.temp_extension.clone())
    }

    /// Returns the soft-delete path for `path`.
    #[must_use]
    pub fn soft_delete_path(&self, path: &Path) -> PathBuf {
        with_appended_extension(path, &self.trash_suffix)
    }

    /// Returns the temporary path used while writing `path`.
    #[must_use]
    pub fn temp_path(&self, path: &Path) -> PathBuf {
        with_appended_extension(path, &self.temp_extension)
    }

    /// Reads a file fully.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file does not exist, or
    /// [`Error::Io`] if it cannot be read.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| read_error(path, e))
    }

    /// Async variant of [`Self::read`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`].
    pub async fn read_async(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| read_error(path, e))
    }

    /// Writes `content` to the temporary sibling of `target` and flushes it
    /// to disk. The target is untouched until [`StagedFile::commit`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created or the
    /// temporary file cannot be written.
    pub fn stage(&self, target: &Path, content: &[u8]) -> Result<StagedFile> {
        ensure_parent(target)?;
        let staged = StagedFile::new(self.temp_path(target), target.to_path_buf());

        let mut file =
            File::create(&staged.temp).map_err(|e| Error::io("create_temp", &staged.temp, e))?;
        file.write_all(content)
            .map_err(|e| Error::io("write_temp", &staged.temp, e))?;
        file.sync_all()
            .map_err(|e| Error::io("sync_temp", &staged.temp, e))?;

        Ok(staged)
    }

    /// Async variant of [`Self::stage`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::stage`].
    pub async fn stage_async(&self, target: &Path, content: &[u8]) -> Result<StagedFile> {
        ensure_parent_async(target).await?;
        let staged = StagedFile::new(self.temp_path(target), target.to_path_buf());

        let mut file = tokio::fs::File::create(&staged.temp)
            .await
            .map_err(|e| Error::io("create_temp", &staged.temp, e))?;
        file.write_all(content)
            .await
            .map_err(|e| Error::io("write_temp", &staged.temp, e))?;
        file.sync_all()
            .await
            .map_err(|e| Error::io("sync_temp", &staged.temp, e))?;

        Ok(staged)
    }

    /// Atomically replaces the content of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing or replacing fails; the previous
    /// content of `target` is then intact.
    pub fn save(&self, target: &Path, content: &[u8]) -> Result<()> {
        self.stage(target, content)?.commit()
    }

    /// Async variant of [`Self::save`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::save`].
    pub async fn save_async(&self, target: &Path, content: &[u8]) -> Result<()> {
        self.stage_async(target, content).await?.commit_async().await
    }

    /// Moves `path` to its soft-delete slot.
    ///
    /// An existing soft-deleted copy is kept and `path` is deleted instead,
    /// so the oldest trashed content survives repeated deletes.
    ///
    /// Returns `false` if `path` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the move or delete fails.
    pub fn soft_delete(&self, path: &Path) -> Result<bool> {
        if !try_exists(path)? {
            return Ok(false);
        }

        let trash = self.soft_delete_path(path);
        if try_exists(&trash)? {
            remove_if_exists(path)?;
        } else {
            move_path(path, &trash)?;
        }

        Ok(true)
    }

    /// Deletes `path` and its soft-deleted copy.
    ///
    /// Returns whether anything was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a delete fails.
    pub fn hard_delete(&self, path: &Path) -> Result<bool> {
        let removed = remove_if_exists(path)?;
        let removed_trash = remove_if_exists(&self.soft_delete_path(path))?;
        Ok(removed || removed_trash)
    }

    /// Moves `primary` into `backup`, first pushing an existing `backup`
    /// into its soft-delete slot.
    ///
    /// Returns `false` (and touches nothing) if `primary` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a move fails.
    pub fn backup(&self, primary: &Path, backup: &Path) -> Result<bool> {
        if !try_exists(primary)? {
            return Ok(false);
        }

        if try_exists(backup)? {
            self.move_file(backup, &self.soft_delete_path(backup), true)?;
        }
        self.move_file(primary, backup, true)?;

        Ok(true)
    }

    /// Async variant of [`Self::backup`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::backup`].
    pub async fn backup_async(&self, primary: &Path, backup: &Path) -> Result<bool> {
        if !try_exists_async(primary).await? {
            return Ok(false);
        }

        if try_exists_async(backup).await? {
            let trash = self.soft_delete_path(backup);
            move_path_async(backup, &trash).await?;
        }
        ensure_parent_async(backup).await?;
        move_path_async(primary, backup).await?;

        Ok(true)
    }

    /// Moves `source` onto `target`, replacing it.
    ///
    /// Returns `false` if `source` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the move fails.
    pub fn restore(&self, target: &Path, source: &Path) -> Result<bool> {
        if !try_exists(source)? {
            return Ok(false);
        }
        self.move_file(source, target, true)?;
        Ok(true)
    }

    /// Moves `source` to `destination`, creating the destination directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WouldOverwrite`] if `destination` exists and
    /// `overwrite` is false, or [`Error::Io`] if the move fails.
    pub fn move_file(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
        if !overwrite && try_exists(destination)? {
            return Err(Error::WouldOverwrite {
                path: destination.to_path_buf(),
            });
        }
        ensure_parent(destination)?;
        move_path(source, destination)
    }
}

/// Content written to a temporary file, waiting to replace its target.
///
/// Dropping an uncommitted staged file removes the temporary file.
#[derive(Debug)]
#[must_use = "staged content is discarded unless committed"]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    const fn new(temp: PathBuf, target: PathBuf) -> Self {
        Self {
            temp,
            target,
            committed: false,
        }
    }

    /// Returns the file this content will replace.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Returns the temporary file holding the content.
    #[must_use]
    pub fn temp(&self) -> &Path {
        &self.temp
    }

    /// Renames the temporary file over the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the rename fails.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp, &self.target)
            .map_err(|e| Error::io("replace_file", &self.target, e))?;
        self.committed = true;
        if let Some(parent) = self.target.parent() {
            fsync_dir(parent).ok();
        }
        Ok(())
    }

    /// Async variant of [`Self::commit`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::commit`].
    pub async fn commit_async(mut self) -> Result<()> {
        tokio::fs::rename(&self.temp, &self.target)
            .await
            .map_err(|e| Error::io("replace_file", &self.target, e))?;
        self.committed = true;
        if let Some(parent) = self.target.parent() {
            fsync_dir_async(parent).await.ok();
        }
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

fn read_error(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        Error::io("read_file", path, e)
    }
}

/// Deletes `path`, treating a missing file as success.
fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io("delete_file", path, e)),
    }
}

/// Renames `from` to `to`, replacing `to`. Falls back to copy and delete
/// when the two paths are on different filesystems.
fn move_path(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => {},
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|e| Error::io("copy_file", to, e))?;
            File::open(to)
                .and_then(|f| f.sync_all())
                .map_err(|e| Error::io("sync_file", to, e))?;
            fs::remove_file(from).map_err(|e| Error::io("delete_file", from, e))?;
        },
        Err(e) => return Err(Error::io("move_file", from, e)),
    }

    tracing::debug!(from = %from.display(), to = %to.display(), "Moved file");
    Ok(())
}

async fn move_path_async(from: &Path, to: &Path) -> Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => {},
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tokio::fs::copy(from, to)
                .await
                .map_err(|e| Error::io("copy_file", to, e))?;
            tokio::fs::remove_file(from)
                .await
                .map_err(|e| Error::io("delete_file", from, e))?;
        },
        Err(e) => return Err(Error::io("move_file", from, e)),
    }

    tracing::debug!(from = %from.display(), to = %to.display(), "Moved file");
    Ok(())
}

/// Returns whether `path` exists; a failed lookup is an error, not absence.
pub(crate) fn try_exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|e| Error::io("stat_file", path, e))
}

async fn try_exists_async(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::io("stat_file", path, e))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| Error::io("create_dir", parent, e))
        },
        _ => Ok(()),
    }
}

async fn ensure_parent_async(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io("create_dir", parent, e)),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
async fn fsync_dir_async(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn fsync_dir_async(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lifecycle() -> FileLifecycle {
        FileLifecycle::new("trash", "tmp")
    }

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    // ============================================================================
    // Save
    // ============================================================================

    #[test]
    fn test_save_creates_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x.cfg");

        lifecycle().save(&target, b"hello").unwrap();

        assert_eq!(read(&target), "hello");
        assert!(!dir.path().join("x.cfg.tmp").exists());
    }

    #[test]
    fn test_save_replaces_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x.cfg");
        write(&target, "old");

        lifecycle().save(&target, b"new").unwrap();

        assert_eq!(read(&target), "new");
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("deeper").join("x.cfg");

        lifecycle().save(&target, b"data").unwrap();

        assert_eq!(read(&target), "data");
    }

    #[test]
    fn test_dropped_stage_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x.cfg");
        write(&target, "old");

        let staged = lifecycle().stage(&target, b"new").unwrap();
        assert!(staged.temp().exists());
        drop(staged);

        assert_eq!(read(&target), "old");
        assert!(!dir.path().join("x.cfg.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_async() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x.cfg");
        write(&target, "old");

        lifecycle().save_async(&target, b"new").await.unwrap();

        assert_eq!(read(&target), "new");
        assert!(!dir.path().join("x.cfg.tmp").exists());
    }

    #[tokio::test]
    async fn test_commit_async_in_nested_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("x.cfg");

        let staged = lifecycle().stage_async(&target, b"data").await.unwrap();
        assert_eq!(staged.target(), target);
        staged.commit_async().await.unwrap();

        assert_eq!(read(&target), "data");
        assert!(!dir.path().join("nested").join("x.cfg.tmp").exists());
    }

    // ============================================================================
    // Read
    // ============================================================================

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = lifecycle().read(&dir.path().join("missing.cfg"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    // ============================================================================
    // Soft and hard delete
    // ============================================================================

    #[test]
    fn test_soft_delete_moves_to_trash() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        write(&primary, "content");

        assert!(lifecycle().soft_delete(&primary).unwrap());

        assert!(!primary.exists());
        assert_eq!(read(&dir.path().join("x.cfg.trash")), "content");
    }

    #[test]
    fn test_soft_delete_keeps_existing_trash() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        let trash = dir.path().join("x.cfg.trash");
        write(&primary, "second");
        write(&trash, "first");

        assert!(lifecycle().soft_delete(&primary).unwrap());

        assert!(!primary.exists());
        assert_eq!(read(&trash), "first");
    }

    #[test]
    fn test_soft_delete_missing_is_noop() {
        let dir = TempDir::new().unwrap();
        assert!(!lifecycle().soft_delete(&dir.path().join("x.cfg")).unwrap());
    }

    #[test]
    fn test_hard_delete_removes_file_and_trash() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        let trash = dir.path().join("x.cfg.trash");
        write(&primary, "a");
        write(&trash, "b");

        assert!(lifecycle().hard_delete(&primary).unwrap());

        assert!(!primary.exists());
        assert!(!trash.exists());
        assert!(!lifecycle().hard_delete(&primary).unwrap());
    }

    // ============================================================================
    // Backup and restore
    // ============================================================================

    #[test]
    fn test_backup_chains_previous_backup() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        let backup = dir.path().join("x.old");
        write(&primary, "v2");
        write(&backup, "v1");

        assert!(lifecycle().backup(&primary, &backup).unwrap());

        assert!(!primary.exists());
        assert_eq!(read(&backup), "v2");
        assert_eq!(read(&dir.path().join("x.old.trash")), "v1");
    }

    #[test]
    fn test_backup_without_primary_is_noop() {
        let dir = TempDir::new().unwrap();
        let backup = dir.path().join("x.old");
        write(&backup, "v1");

        assert!(!lifecycle().backup(&dir.path().join("x.cfg"), &backup).unwrap());
        assert_eq!(read(&backup), "v1");
    }

    #[test]
    fn test_backup_into_other_directory() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        let backup = dir.path().join("backups").join("x.old");
        write(&primary, "v1");

        assert!(lifecycle().backup(&primary, &backup).unwrap());
        assert_eq!(read(&backup), "v1");
    }

    #[tokio::test]
    async fn test_backup_async_chains_previous_backup() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        let backup = dir.path().join("x.old");
        write(&primary, "v2");
        write(&backup, "v1");

        assert!(lifecycle().backup_async(&primary, &backup).await.unwrap());

        assert_eq!(read(&backup), "v2");
        assert_eq!(read(&dir.path().join("x.old.trash")), "v1");
    }

    #[test]
    fn test_restore_overwrites_target() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        let trash = dir.path().join("x.cfg.trash");
        write(&primary, "current");
        write(&trash, "deleted");

        assert!(lifecycle().restore(&primary, &trash).unwrap());

        assert_eq!(read(&primary), "deleted");
        assert!(!trash.exists());
    }

    #[test]
    fn test_restore_missing_source_is_noop() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("x.cfg");
        write(&primary, "current");

        assert!(
            !lifecycle()
                .restore(&primary, &dir.path().join("x.cfg.trash"))
                .unwrap()
        );
        assert_eq!(read(&primary), "current");
    }

    #[test]
    fn test_move_file_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.cfg");
        let b = dir.path().join("b.cfg");
        write(&a, "a");
        write(&b, "b");

        let result = lifecycle().move_file(&a, &b, false);

        assert!(matches!(result, Err(Error::WouldOverwrite { .. })));
        assert_eq!(read(&a), "a");
        assert_eq!(read(&b), "b");

        lifecycle().move_file(&a, &b, true).unwrap();
        assert!(!a.exists());
        assert_eq!(read(&b), "a");
    }

    // ============================================================================
    // Lookup failures
    // ============================================================================

    /// A regular file used as a directory makes every lookup beneath it fail
    /// with something other than "not found".
    fn unreachable_paths(dir: &Path) -> (PathBuf, PathBuf) {
        let blocker = dir.join("blocker");
        write(&blocker, "not a directory");
        (blocker.join("x.cfg"), blocker.join("x.old"))
    }

    #[test]
    fn test_backup_surfaces_lookup_error() {
        let dir = TempDir::new().unwrap();
        let (primary, backup) = unreachable_paths(dir.path());

        let result = lifecycle().backup(&primary, &backup);

        assert!(matches!(result, Err(Error::Io { operation: "stat_file", .. })));
    }

    #[test]
    fn test_soft_delete_and_restore_surface_lookup_error() {
        let dir = TempDir::new().unwrap();
        let (primary, backup) = unreachable_paths(dir.path());

        assert!(matches!(lifecycle().soft_delete(&primary), Err(Error::Io { .. })));
        assert!(matches!(lifecycle().restore(&primary, &backup), Err(Error::Io { .. })));
    }

    #[tokio::test]
    async fn test_backup_async_surfaces_lookup_error() {
        let dir = TempDir::new().unwrap();
        let (primary, backup) = unreachable_paths(dir.path());

        let result = lifecycle().backup_async(&primary, &backup).await;

        assert!(matches!(result, Err(Error::Io { operation: "stat_file", .. })));
    }
}
