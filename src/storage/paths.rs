//! Record name to slot path resolution.
//!
//! Resolution is a pure function of the name and the [`NamingPolicy`]; it
//! never touches the filesystem.
//!
//! A name can be given as:
//! - a bare stem: `settings`
//! - a stem with the primary extension: `settings.cfg`
//! - an absolute path: `/srv/app/settings.cfg`
//!
//! # Security
//!
//! Relative names with more than one component (`../x`, `a/b`) are rejected
//! so a record can never escape the configured directory.

use crate::{Error, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Longest file name most filesystems accept, in bytes.
const MAX_FILE_NAME_LEN: usize = 255;

/// Characters no supported filesystem accepts in a file name.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\0'];

/// The four roles a physical file can play for a logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// The live file.
    Primary,
    /// The primary after a non-destructive delete.
    SoftDeletePrimary,
    /// The primary as it was before the latest overwrite.
    Backup,
    /// The backup as it was before the latest backup.
    SoftDeleteBackup,
}

impl Slot {
    /// All slots, primary first.
    pub const ALL: [Self; 4] = [
        Self::Primary,
        Self::SoftDeletePrimary,
        Self::Backup,
        Self::SoftDeleteBackup,
    ];

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::SoftDeletePrimary => "soft-delete-primary",
            Self::Backup => "backup",
            Self::SoftDeleteBackup => "soft-delete-backup",
        }
    }

    /// Returns whether the slot holds backup content.
    #[must_use]
    pub const fn is_backup(&self) -> bool {
        matches!(self, Self::Backup | Self::SoftDeleteBackup)
    }

    /// Returns whether the slot is a trash slot.
    #[must_use]
    pub const fn is_soft_deleted(&self) -> bool {
        matches!(self, Self::SoftDeletePrimary | Self::SoftDeleteBackup)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Naming rules shared by every record of a repository.
///
/// Extensions are stored without a leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    /// Directory of primary files.
    pub directory: PathBuf,
    /// Directory of backup files.
    pub backup_directory: PathBuf,
    /// Primary extension.
    pub extension: String,
    /// Backup extension.
    pub backup_extension: String,
    /// Marker appended to soft-deleted files.
    pub trash_suffix: String,
    /// Extension appended to a file while it is being written.
    pub temp_extension: String,
}

impl NamingPolicy {
    /// Creates a policy with default extensions, backups beside primaries.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            backup_directory: directory.clone(),
            directory,
            extension: crate::config::DEFAULT_EXTENSION.to_string(),
            backup_extension: crate::config::DEFAULT_BACKUP_EXTENSION.to_string(),
            trash_suffix: crate::config::DEFAULT_TRASH_SUFFIX.to_string(),
            temp_extension: crate::config::DEFAULT_TEMP_EXTENSION.to_string(),
        }
    }

    fn reserved_extensions(&self) -> [&str; 3] {
        [
            self.backup_extension.as_str(),
            self.trash_suffix.as_str(),
            self.temp_extension.as_str(),
        ]
    }
}

/// The resolved paths of one logical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPaths {
    stem: String,
    backup_extension: String,
    trash_suffix: String,
    primary: PathBuf,
    soft_delete_primary: PathBuf,
    backup: PathBuf,
    soft_delete_backup: PathBuf,
    temp: PathBuf,
}

impl RecordPaths {
    /// Returns the record stem (file name without extension).
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Returns the path of `slot`.
    #[must_use]
    pub fn path(&self, slot: Slot) -> &Path {
        match slot {
            Slot::Primary => &self.primary,
            Slot::SoftDeletePrimary => &self.soft_delete_primary,
            Slot::Backup => &self.backup,
            Slot::SoftDeleteBackup => &self.soft_delete_backup,
        }
    }

    /// Returns the primary path, which is also the record's identity.
    #[must_use]
    pub fn primary(&self) -> &Path {
        &self.primary
    }

    /// Returns the soft-deleted primary path.
    #[must_use]
    pub fn soft_delete_primary(&self) -> &Path {
        &self.soft_delete_primary
    }

    /// Returns the backup path.
    #[must_use]
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Returns the soft-deleted backup path.
    #[must_use]
    pub fn soft_delete_backup(&self) -> &Path {
        &self.soft_delete_backup
    }

    /// Returns the temporary path used while writing the primary.
    #[must_use]
    pub fn temp(&self) -> &Path {
        &self.temp
    }

    /// Returns the directory holding the backup slots.
    #[must_use]
    pub fn backup_directory(&self) -> &Path {
        self.backup.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Returns the backup extension.
    #[must_use]
    pub fn backup_extension(&self) -> &str {
        &self.backup_extension
    }

    /// Returns the soft-delete marker.
    #[must_use]
    pub fn trash_suffix(&self) -> &str {
        &self.trash_suffix
    }

    /// Returns the path of a timestamped backup generation:
    /// `{backup_dir}/{stem}.{stamp}.{backup_ext}`.
    #[must_use]
    pub fn timestamped_backup(&self, stamp: &str) -> PathBuf {
        self.backup_directory()
            .join(format!("{}.{stamp}.{}", self.stem, self.backup_extension))
    }

    /// Iterates over all slots and their paths.
    pub fn slots(&self) -> impl Iterator<Item = (Slot, &Path)> {
        Slot::ALL.into_iter().map(|slot| (slot, self.path(slot)))
    }
}

/// Appends `.{extension}` to the file name of `path`.
#[must_use]
pub fn with_appended_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Maps record names onto slot paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    policy: NamingPolicy,
}

impl PathResolver {
    /// Creates a resolver for `policy`.
    #[must_use]
    pub const fn new(policy: NamingPolicy) -> Self {
        Self { policy }
    }

    /// Returns the naming policy.
    #[must_use]
    pub const fn policy(&self) -> &NamingPolicy {
        &self.policy
    }

    /// Resolves a record name to its slot paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if the name is empty, contains
    /// characters illegal in file names, is a relative multi-component path,
    /// carries a reserved extension (backup, trash or temp), or would produce
    /// an over-long file name.
    pub fn resolve(&self, name: &str) -> Result<RecordPaths> {
        let invalid = |reason: String| Error::InvalidName {
            name: name.to_string(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }

        let path = Path::new(name);
        let (directory, file_name) = if path.is_absolute() {
            let file_name = match path.components().next_back() {
                Some(Component::Normal(file_name)) => file_name
                    .to_str()
                    .ok_or_else(|| invalid("name is not valid UTF-8".to_string()))?,
                _ => return Err(invalid("path does not end in a file name".to_string())),
            };
            let parent = path
                .parent()
                .ok_or_else(|| invalid("path has no parent directory".to_string()))?;
            (parent.to_path_buf(), file_name)
        } else {
            if name.contains(['/', '\\']) || matches!(name, "." | "..") {
                return Err(invalid(
                    "name must be a bare file name or an absolute path".to_string(),
                ));
            }
            (self.policy.directory.clone(), name)
        };

        let stem = self.stem_of(file_name).map_err(invalid)?;

        // Absolute names keep their backups beside them unless a dedicated
        // backup directory is configured.
        let backup_directory = if self.policy.backup_directory == self.policy.directory {
            directory.clone()
        } else {
            self.policy.backup_directory.clone()
        };

        let paths = self.build(&directory, &backup_directory, &stem);
        for (_, slot_path) in paths.slots() {
            let len = slot_path.file_name().map_or(0, |n| n.len());
            if len > MAX_FILE_NAME_LEN {
                return Err(invalid(format!(
                    "file name exceeds {MAX_FILE_NAME_LEN} bytes: {}",
                    slot_path.display()
                )));
            }
        }

        Ok(paths)
    }

    /// Validates a file name and strips the primary extension.
    fn stem_of(&self, file_name: &str) -> std::result::Result<String, String> {
        if let Some(c) = file_name
            .chars()
            .find(|c| ILLEGAL_CHARS.contains(c) || c.is_control())
        {
            return Err(format!("illegal character {c:?}"));
        }
        if file_name.ends_with(['.', ' ']) {
            return Err("name must not end with '.' or ' '".to_string());
        }

        for reserved in self.policy.reserved_extensions() {
            if has_extension(file_name, reserved) {
                return Err(format!("extension '.{reserved}' is reserved"));
            }
        }

        let stem = strip_extension(file_name, &self.policy.extension).unwrap_or(file_name);
        if stem.is_empty() {
            return Err("name has no stem".to_string());
        }

        Ok(stem.to_string())
    }

    fn build(&self, directory: &Path, backup_directory: &Path, stem: &str) -> RecordPaths {
        let policy = &self.policy;
        let primary = directory.join(format!("{stem}.{}", policy.extension));
        let backup = backup_directory.join(format!("{stem}.{}", policy.backup_extension));

        RecordPaths {
            stem: stem.to_string(),
            backup_extension: policy.backup_extension.clone(),
            trash_suffix: policy.trash_suffix.clone(),
            soft_delete_primary: with_appended_extension(&primary, &policy.trash_suffix),
            temp: with_appended_extension(&primary, &policy.temp_extension),
            soft_delete_backup: with_appended_extension(&backup, &policy.trash_suffix),
            primary,
            backup,
        }
    }
}

/// Case-insensitive check for a trailing `.{extension}`.
fn has_extension(file_name: &str, extension: &str) -> bool {
    strip_extension(file_name, extension).is_some()
}

fn strip_extension<'a>(file_name: &'a str, extension: &str) -> Option<&'a str> {
    let split = file_name.len().checked_sub(extension.len() + 1)?;
    let (stem, tail) = (file_name.get(..split)?, file_name.get(split..)?);
    let tail = tail.strip_prefix('.')?;
    tail.eq_ignore_ascii_case(extension).then_some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn resolver() -> PathResolver {
        PathResolver::new(NamingPolicy::new("/data"))
    }

    #[test]
    fn test_resolve_bare_name() {
        let paths = resolver().resolve("settings").unwrap();
        assert_eq!(paths.stem(), "settings");
        assert_eq!(paths.primary(), Path::new("/data/settings.cfg"));
        assert_eq!(
            paths.soft_delete_primary(),
            Path::new("/data/settings.cfg.trash")
        );
        assert_eq!(paths.backup(), Path::new("/data/settings.old"));
        assert_eq!(
            paths.soft_delete_backup(),
            Path::new("/data/settings.old.trash")
        );
        assert_eq!(paths.temp(), Path::new("/data/settings.cfg.tmp"));
    }

    #[test_case("settings" ; "bare")]
    #[test_case("settings.cfg" ; "with extension")]
    #[test_case("settings.CFG" ; "extension case insensitive")]
    #[test_case("/data/settings.cfg" ; "absolute")]
    fn test_resolve_forms_agree(name: &str) {
        let paths = resolver().resolve(name).unwrap();
        assert_eq!(paths.primary(), Path::new("/data/settings.cfg"));
    }

    #[test]
    fn test_resolve_absolute_outside_directory() {
        let paths = resolver().resolve("/elsewhere/app.cfg").unwrap();
        assert_eq!(paths.primary(), Path::new("/elsewhere/app.cfg"));
        assert_eq!(paths.backup(), Path::new("/elsewhere/app.old"));
    }

    #[test]
    fn test_resolve_separate_backup_directory() {
        let mut policy = NamingPolicy::new("/data");
        policy.backup_directory = PathBuf::from("/backups");
        let paths = PathResolver::new(policy).resolve("app").unwrap();
        assert_eq!(paths.primary(), Path::new("/data/app.cfg"));
        assert_eq!(paths.backup(), Path::new("/backups/app.old"));
        assert_eq!(
            paths.soft_delete_backup(),
            Path::new("/backups/app.old.trash")
        );
        assert_eq!(paths.backup_directory(), Path::new("/backups"));
    }

    #[test]
    fn test_dotted_stem_is_kept() {
        let paths = resolver().resolve("app.v2").unwrap();
        assert_eq!(paths.stem(), "app.v2");
        assert_eq!(paths.primary(), Path::new("/data/app.v2.cfg"));
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("a|b" ; "pipe")]
    #[test_case("a?b" ; "question mark")]
    #[test_case("a*b" ; "star")]
    #[test_case("a\u{1}b" ; "control char")]
    #[test_case("name." ; "trailing dot")]
    #[test_case("../escape" ; "traversal")]
    #[test_case("sub/name" ; "relative path")]
    #[test_case("name.old" ; "backup extension")]
    #[test_case("name.cfg.trash" ; "trash suffix")]
    #[test_case("name.tmp" ; "temp extension")]
    #[test_case(".cfg" ; "no stem")]
    fn test_resolve_rejects(name: &str) {
        let result = resolver().resolve(name);
        assert!(
            matches!(result, Err(Error::InvalidName { .. })),
            "expected InvalidName for {name:?}, got {result:?}"
        );
    }

    #[test]
    fn test_resolve_rejects_overlong_name() {
        let name = "x".repeat(250);
        let result = resolver().resolve(&name);
        assert!(matches!(result, Err(Error::InvalidName { .. })));
    }

    #[test]
    fn test_timestamped_backup_path() {
        let paths = resolver().resolve("app").unwrap();
        assert_eq!(
            paths.timestamped_backup("2024_01_02_03_04_05"),
            Path::new("/data/app.2024_01_02_03_04_05.old")
        );
    }

    #[test]
    fn test_slot_flags() {
        assert!(Slot::Backup.is_backup());
        assert!(Slot::SoftDeleteBackup.is_backup());
        assert!(!Slot::Primary.is_backup());
        assert!(Slot::SoftDeletePrimary.is_soft_deleted());
        assert!(!Slot::Backup.is_soft_deleted());
        assert_eq!(Slot::SoftDeleteBackup.to_string(), "soft-delete-backup");
    }

    #[test]
    fn test_with_appended_extension() {
        assert_eq!(
            with_appended_extension(Path::new("/a/b.cfg"), "trash"),
            PathBuf::from("/a/b.cfg.trash")
        );
    }
}
