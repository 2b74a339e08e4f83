//! Configuration management.
//!
//! A repository is configured once, at construction, through an immutable
//! [`RepositorySettings`]. Settings can be built in code, parsed from a TOML
//! file, and adjusted from environment variables:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `SLOTSTORE_DIR` | `directory` |
//! | `SLOTSTORE_BACKUP_COUNT` | `backup.number_of_backups` |
//! | `SLOTSTORE_BACKUP_MAX_AGE_DAYS` | `backup.max_age_in_days` |

mod backup;

pub use backup::{BackupSettings, DEFAULT_BACKUP_EXTENSION, DEFAULT_TIMESTAMP_FORMAT};

use crate::storage::NamingPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the repository directory.
pub const DIR_ENV: &str = "SLOTSTORE_DIR";

/// Environment variable overriding the maximum number of backups.
pub const BACKUP_COUNT_ENV: &str = "SLOTSTORE_BACKUP_COUNT";

/// Environment variable overriding the maximum backup age in days.
pub const BACKUP_MAX_AGE_ENV: &str = "SLOTSTORE_BACKUP_MAX_AGE_DAYS";

/// Default extension of primary files.
pub const DEFAULT_EXTENSION: &str = "cfg";

/// Default extension of in-flight temporary files.
pub const DEFAULT_TEMP_EXTENSION: &str = "tmp";

/// Default marker appended to soft-deleted files.
pub const DEFAULT_TRASH_SUFFIX: &str = "trash";

/// Per-repository settings.
///
/// Treated as immutable once handed to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    /// Directory holding primary files.
    pub directory: PathBuf,
    /// Extension of primary files, without the leading dot.
    pub extension: String,
    /// Extension of temporary files written before an atomic replace.
    pub temp_extension: String,
    /// Marker appended to soft-deleted files.
    pub trash_suffix: String,
    /// Whether read and saved objects are kept in the identity cache.
    pub is_caching: bool,
    /// Whether fingerprints are kept for dirty checks.
    pub is_tracking_dirty: bool,
    /// Backup configuration; `None` disables backups on save.
    pub backup: Option<BackupSettings>,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self::new(Self::default_directory())
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Repository directory.
    pub directory: Option<String>,
    /// Primary extension.
    pub extension: Option<String>,
    /// Temporary file extension.
    pub temp_extension: Option<String>,
    /// Soft-delete marker.
    pub trash_suffix: Option<String>,
    /// Identity cache switch.
    pub caching: Option<bool>,
    /// Dirty tracking switch.
    pub tracking_dirty: Option<bool>,
    /// Backup section; presence enables backups.
    pub backup: Option<ConfigFileBackup>,
}

/// Backup section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileBackup {
    /// Backup directory.
    pub directory: Option<String>,
    /// Backup extension.
    pub extension: Option<String>,
    /// Timestamp format for generation files.
    pub timestamp_format: Option<String>,
    /// Maximum number of generations.
    pub number_of_backups: Option<usize>,
    /// Maximum generation age in days.
    pub max_age_in_days: Option<u32>,
}

impl RepositorySettings {
    /// Creates settings for `directory` with default naming, caching and
    /// dirty tracking on, and backups off.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            temp_extension: DEFAULT_TEMP_EXTENSION.to_string(),
            trash_suffix: DEFAULT_TRASH_SUFFIX.to_string(),
            is_caching: true,
            is_tracking_dirty: true,
            backup: None,
        }
    }

    /// Returns the per-user data directory used when none is configured.
    ///
    /// Falls back to `{temp}/slotstore` if the platform directories cannot
    /// be resolved.
    #[must_use]
    pub fn default_directory() -> PathBuf {
        directories::ProjectDirs::from("", "", "slotstore").map_or_else(
            || {
                tracing::warn!("Failed to resolve user data dir; falling back to temp dir");
                std::env::temp_dir().join("slotstore")
            },
            |dirs| dirs.data_dir().to_path_buf(),
        )
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::io("read_config_file", path, e))?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| {
            Error::InvalidInput(format!("failed to parse {}: {e}", path.display()))
        })?;

        Self::from_config_file(file).validated()
    }

    /// Converts a `ConfigFile` to `RepositorySettings`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut settings = file
            .directory
            .map_or_else(Self::default, |dir| Self::new(PathBuf::from(dir)));

        if let Some(ext) = file.extension {
            settings.extension = ext;
        }
        if let Some(ext) = file.temp_extension {
            settings.temp_extension = ext;
        }
        if let Some(suffix) = file.trash_suffix {
            settings.trash_suffix = suffix;
        }
        if let Some(v) = file.caching {
            settings.is_caching = v;
        }
        if let Some(v) = file.tracking_dirty {
            settings.is_tracking_dirty = v;
        }
        if let Some(backup) = file.backup {
            let defaults = BackupSettings::default();
            settings.backup = Some(BackupSettings {
                directory: backup.directory.map(PathBuf::from),
                extension: backup.extension.unwrap_or(defaults.extension),
                timestamp_format: backup.timestamp_format,
                number_of_backups: backup
                    .number_of_backups
                    .unwrap_or(defaults.number_of_backups),
                max_age_in_days: backup.max_age_in_days.unwrap_or(defaults.max_age_in_days),
            });
        }

        settings
    }

    /// Applies `SLOTSTORE_*` environment overrides.
    ///
    /// Backup limits only apply when backups are configured.
    #[must_use]
    pub fn from_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(DIR_ENV) {
            if !dir.trim().is_empty() {
                self.directory = PathBuf::from(dir);
            }
        }

        if let Some(backup) = self.backup.as_mut() {
            if let Some(n) = std::env::var(BACKUP_COUNT_ENV)
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
            {
                backup.number_of_backups = n;
            }
            if let Some(d) = std::env::var(BACKUP_MAX_AGE_ENV)
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
            {
                backup.max_age_in_days = d;
            }
        }

        self
    }

    /// Normalizes extensions and checks the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an extension is empty or contains a
    /// path separator, or if two roles share an extension in one directory.
    pub fn validated(mut self) -> Result<Self> {
        self.extension = normalize_extension(&self.extension, "extension")?;
        self.temp_extension = normalize_extension(&self.temp_extension, "temp_extension")?;
        self.trash_suffix = normalize_extension(&self.trash_suffix, "trash_suffix")?;

        if self.temp_extension == self.extension {
            return Err(Error::InvalidInput(
                "temp_extension must differ from extension".to_string(),
            ));
        }

        if let Some(backup) = self.backup.take() {
            let backup = backup.validated()?;
            let shares_dir = backup
                .directory
                .as_ref()
                .is_none_or(|dir| dir == &self.directory);
            if shares_dir && backup.extension == self.extension {
                return Err(Error::InvalidInput(
                    "backup extension must differ from extension when sharing a directory"
                        .to_string(),
                ));
            }
            self.backup = Some(backup);
        }

        Ok(self)
    }

    /// Returns the naming policy derived from these settings.
    #[must_use]
    pub fn naming_policy(&self) -> NamingPolicy {
        let (backup_directory, backup_extension) = self.backup.as_ref().map_or_else(
            || {
                (
                    self.directory.clone(),
                    BackupSettings::default().extension,
                )
            },
            |b| {
                (
                    b.directory.clone().unwrap_or_else(|| self.directory.clone()),
                    b.extension.clone(),
                )
            },
        );

        NamingPolicy {
            directory: self.directory.clone(),
            backup_directory,
            extension: self.extension.clone(),
            backup_extension,
            trash_suffix: self.trash_suffix.clone(),
            temp_extension: self.temp_extension.clone(),
        }
    }

    /// Returns whether saves take backups.
    #[must_use]
    pub const fn is_creating_backups(&self) -> bool {
        self.backup.is_some()
    }

    /// Sets the primary extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the soft-delete marker.
    #[must_use]
    pub fn with_trash_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.trash_suffix = suffix.into();
        self
    }

    /// Enables or disables the identity cache.
    #[must_use]
    pub const fn with_caching(mut self, enabled: bool) -> Self {
        self.is_caching = enabled;
        self
    }

    /// Enables or disables dirty tracking.
    #[must_use]
    pub const fn with_dirty_tracking(mut self, enabled: bool) -> Self {
        self.is_tracking_dirty = enabled;
        self
    }

    /// Sets the backup configuration.
    #[must_use]
    pub fn with_backup(mut self, backup: BackupSettings) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Enables backups with default settings.
    #[must_use]
    pub fn with_default_backups(self) -> Self {
        self.with_backup(BackupSettings::default())
    }
}

/// Strips a leading dot and rejects empty or path-like extensions.
pub(crate) fn normalize_extension(extension: &str, field: &str) -> Result<String> {
    let trimmed = extension.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{field} must not be empty")));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(Error::InvalidInput(format!(
            "{field} must not contain path separators: {extension}"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = RepositorySettings::new("/data");
        assert_eq!(settings.extension, "cfg");
        assert_eq!(settings.temp_extension, "tmp");
        assert_eq!(settings.trash_suffix, "trash");
        assert!(settings.is_caching);
        assert!(settings.is_tracking_dirty);
        assert!(!settings.is_creating_backups());
    }

    #[test]
    fn test_validated_strips_leading_dot() {
        let settings = RepositorySettings::new("/data")
            .with_extension(".json")
            .with_trash_suffix(".deleted")
            .validated()
            .unwrap();
        assert_eq!(settings.extension, "json");
        assert_eq!(settings.trash_suffix, "deleted");
    }

    #[test]
    fn test_validated_rejects_empty_extension() {
        let result = RepositorySettings::new("/data").with_extension(".").validated();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validated_rejects_shared_backup_extension() {
        let backup = BackupSettings::default().with_extension("cfg");
        let result = RepositorySettings::new("/data")
            .with_backup(backup)
            .validated();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_shared_extension_allowed_in_separate_backup_dir() {
        let backup = BackupSettings::default()
            .with_extension("cfg")
            .with_directory("/data/backups");
        let result = RepositorySettings::new("/data")
            .with_backup(backup)
            .validated();
        assert!(result.is_ok());
    }

    #[test]
    fn test_naming_policy_uses_backup_directory() {
        let settings = RepositorySettings::new("/data")
            .with_backup(BackupSettings::default().with_directory("/backups"));
        let policy = settings.naming_policy();
        assert_eq!(policy.directory, PathBuf::from("/data"));
        assert_eq!(policy.backup_directory, PathBuf::from("/backups"));
        assert_eq!(policy.backup_extension, "old");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
directory = "/srv/app"
extension = "json"
caching = false

[backup]
extension = "bak"
number_of_backups = 5
max_age_in_days = 30
"#
        )
        .unwrap();

        let settings = RepositorySettings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.directory, PathBuf::from("/srv/app"));
        assert_eq!(settings.extension, "json");
        assert!(!settings.is_caching);
        assert!(settings.is_tracking_dirty);

        let backup = settings.backup.unwrap();
        assert_eq!(backup.extension, "bak");
        assert_eq!(backup.number_of_backups, 5);
        assert_eq!(backup.max_age_in_days, 30);
        assert!(backup.timestamp_format.is_none());
    }

    #[test]
    fn test_load_from_file_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "directory = [").unwrap();
        let result = RepositorySettings::load_from_file(file.path());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = RepositorySettings::load_from_file(Path::new("/nonexistent/slotstore.toml"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_settings_roundtrip_through_json() {
        let settings = RepositorySettings::new("/data").with_default_backups();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: RepositorySettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
