//! Backup settings.

use crate::gc::BackupRetention;
use crate::{Error, Result};
use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default extension of backup files.
pub const DEFAULT_BACKUP_EXTENSION: &str = "old";

/// Timestamp format suggested for timestamped generations.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// How and where backups are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Backup directory; `None` keeps backups beside the primary files.
    pub directory: Option<PathBuf>,
    /// Extension of backup files, without the leading dot.
    pub extension: String,
    /// When set, every backup gets its own `name.<timestamp>.<ext>` file.
    pub timestamp_format: Option<String>,
    /// Maximum number of generations kept; 0 disables the limit.
    pub number_of_backups: usize,
    /// Maximum generation age in days; 0 disables the limit.
    pub max_age_in_days: u32,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            directory: None,
            extension: DEFAULT_BACKUP_EXTENSION.to_string(),
            timestamp_format: None,
            number_of_backups: 0,
            max_age_in_days: 0,
        }
    }
}

impl BackupSettings {
    /// Sets the backup directory.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Sets the backup extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Enables timestamped generation files.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = Some(format.into());
        self
    }

    /// Sets the maximum number of generations.
    #[must_use]
    pub const fn with_number_of_backups(mut self, count: usize) -> Self {
        self.number_of_backups = count;
        self
    }

    /// Sets the maximum generation age.
    #[must_use]
    pub const fn with_max_age_in_days(mut self, days: u32) -> Self {
        self.max_age_in_days = days;
        self
    }

    /// Returns the retention policy for these settings.
    #[must_use]
    pub const fn retention(&self) -> BackupRetention {
        BackupRetention::new(self.number_of_backups, self.max_age_in_days)
    }

    /// Normalizes the extension and checks the timestamp format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the extension is empty or the
    /// timestamp format cannot be formatted and parsed back.
    pub fn validated(mut self) -> Result<Self> {
        self.extension = super::normalize_extension(&self.extension, "backup.extension")?;
        if let Some(format) = self.timestamp_format.as_deref() {
            validate_timestamp_format(format)?;
        }
        Ok(self)
    }
}

/// A timestamp format is usable when it has no invalid directives, produces
/// a file-name-safe string, and parses back into the same instant.
fn validate_timestamp_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidInput(format!(
            "invalid timestamp format: {format}"
        )));
    }

    let sample = chrono::Local::now().naive_local();
    let rendered = sample.format(format).to_string();
    if rendered.is_empty() || rendered.contains(['/', '\\', ':']) {
        return Err(Error::InvalidInput(format!(
            "timestamp format must render a file-name-safe string: {format}"
        )));
    }
    if NaiveDateTime::parse_from_str(&rendered, format).is_err() {
        return Err(Error::InvalidInput(format!(
            "timestamp format must include date and time: {format}"
        )));
    }

    Ok(())
}
