//! Backup generations of a record.
//!
//! A generation is one file holding earlier content of a record: the
//! `Backup` and `SoftDeleteBackup` slots, plus any timestamped backups
//! (`name.<timestamp>.<ext>`) when timestamped generations are enabled.

use super::paths::{RecordPaths, Slot};
use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where a generation lives relative to its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationKind {
    /// One of the fixed backup slots.
    Slot(Slot),
    /// A timestamped backup; `suffix` is the file name after `{stem}.`.
    Timestamped {
        /// File name remainder, e.g. `2024_01_02_03_04_05.old`.
        suffix: String,
    },
}

/// One backup file of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupGeneration {
    /// Path of the backup file.
    pub path: PathBuf,
    /// When the generation was taken.
    pub timestamp: DateTime<Local>,
    /// Slot or timestamped file.
    pub kind: GenerationKind,
}

impl BackupGeneration {
    /// Returns the path of the same generation for another record.
    #[must_use]
    pub fn path_for(&self, record: &RecordPaths) -> PathBuf {
        match &self.kind {
            GenerationKind::Slot(slot) => record.path(*slot).to_path_buf(),
            GenerationKind::Timestamped { suffix } => record
                .backup_directory()
                .join(format!("{}.{suffix}", record.stem())),
        }
    }

    /// Returns whether this is a timestamped generation.
    #[must_use]
    pub const fn is_timestamped(&self) -> bool {
        matches!(self.kind, GenerationKind::Timestamped { .. })
    }
}

/// The backup generations of one record, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSet {
    generations: Vec<BackupGeneration>,
}

impl GenerationSet {
    /// Builds a set from generations in any order.
    #[must_use]
    pub fn from_generations(mut generations: Vec<BackupGeneration>) -> Self {
        generations.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.path.cmp(&b.path)));
        Self { generations }
    }

    /// Lists the backup files of `record` that exist on disk.
    ///
    /// Slot generations are dated by modification time. With a timestamp
    /// format, files named `{stem}.{timestamp}.{backup_ext}` (and their
    /// soft-deleted copies) are included and dated by the timestamp in the
    /// name; files whose middle part does not parse belong to other records
    /// and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the backup directory exists but cannot be
    /// listed.
    pub fn scan(record: &RecordPaths, timestamp_format: Option<&str>) -> Result<Self> {
        let mut generations = Vec::new();

        for slot in [Slot::Backup, Slot::SoftDeleteBackup] {
            let path = record.path(slot);
            if let Some(timestamp) = modified_time(path) {
                generations.push(BackupGeneration {
                    path: path.to_path_buf(),
                    timestamp,
                    kind: GenerationKind::Slot(slot),
                });
            }
        }

        if let Some(format) = timestamp_format {
            generations.extend(scan_timestamped(record, format)?);
        }

        Ok(Self::from_generations(generations))
    }

    /// Returns the number of generations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    /// Returns whether there are no generations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Returns the oldest generation.
    #[must_use]
    pub fn oldest(&self) -> Option<&BackupGeneration> {
        self.generations.first()
    }

    /// Returns the newest generation.
    #[must_use]
    pub fn newest(&self) -> Option<&BackupGeneration> {
        self.generations.last()
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, BackupGeneration> {
        self.generations.iter()
    }

    /// Returns the generations as a slice, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[BackupGeneration] {
        &self.generations
    }

    /// Returns the paths of all generations, oldest first.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.generations.iter().map(|g| g.path.clone()).collect()
    }
}

impl IntoIterator for GenerationSet {
    type Item = BackupGeneration;
    type IntoIter = std::vec::IntoIter<BackupGeneration>;

    fn into_iter(self) -> Self::IntoIter {
        self.generations.into_iter()
    }
}

impl<'a> IntoIterator for &'a GenerationSet {
    type Item = &'a BackupGeneration;
    type IntoIter = std::slice::Iter<'a, BackupGeneration>;

    fn into_iter(self) -> Self::IntoIter {
        self.generations.iter()
    }
}

fn scan_timestamped(record: &RecordPaths, format: &str) -> Result<Vec<BackupGeneration>> {
    let dir = record.backup_directory();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io("list_backups", dir, e)),
    };

    let prefix = format!("{}.", record.stem());
    let extension = format!(".{}", record.backup_extension());
    let trashed_extension = format!("{extension}.{}", record.trash_suffix());

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io("list_backups", dir, e))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(suffix) = file_name.strip_prefix(&prefix) else {
            continue;
        };
        let stamp = suffix
            .strip_suffix(&trashed_extension)
            .or_else(|| suffix.strip_suffix(&extension));
        let Some(timestamp) = stamp.and_then(|s| parse_timestamp(s, format)) else {
            continue;
        };

        found.push(BackupGeneration {
            path: entry.path(),
            timestamp,
            kind: GenerationKind::Timestamped {
                suffix: suffix.to_string(),
            },
        });
    }

    Ok(found)
}

fn parse_timestamp(stamp: &str, format: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(stamp, format).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

fn modified_time(path: &Path) -> Option<DateTime<Local>> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NamingPolicy, PathResolver, with_appended_extension};
    use tempfile::TempDir;

    const FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

    fn record(dir: &Path) -> RecordPaths {
        PathResolver::new(NamingPolicy::new(dir))
            .resolve("app")
            .unwrap()
    }

    #[test]
    fn test_scan_empty() {
        let dir = TempDir::new().unwrap();
        let set = GenerationSet::scan(&record(dir.path()), Some(FORMAT)).unwrap();
        assert!(set.is_empty());
        assert!(set.newest().is_none());
    }

    #[test]
    fn test_scan_missing_backup_directory() {
        let dir = TempDir::new().unwrap();
        let mut policy = NamingPolicy::new(dir.path());
        policy.backup_directory = dir.path().join("absent");
        let record = PathResolver::new(policy).resolve("app").unwrap();

        let set = GenerationSet::scan(&record, Some(FORMAT)).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_scan_slots() {
        let dir = TempDir::new().unwrap();
        let record = record(dir.path());
        fs::write(record.backup(), "b").unwrap();
        fs::write(record.soft_delete_backup(), "sb").unwrap();
        fs::write(record.primary(), "p").unwrap();

        let set = GenerationSet::scan(&record, None).unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|g| !g.is_timestamped()));
    }

    #[test]
    fn test_scan_timestamped_orders_by_name() {
        let dir = TempDir::new().unwrap();
        let record = record(dir.path());
        let newer = record.timestamped_backup("2024_06_01_00_00_00");
        let older = record.timestamped_backup("2023_01_01_00_00_00");
        fs::write(&newer, "new").unwrap();
        fs::write(&older, "old").unwrap();
        fs::write(with_appended_extension(&older, "trash"), "older").unwrap();
        // Belongs to record "app.v2", not "app".
        fs::write(dir.path().join("app.v2.old"), "other").unwrap();

        let set = GenerationSet::scan(&record, Some(FORMAT)).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.newest().unwrap().path, newer);
        assert!(set.oldest().unwrap().path.starts_with(dir.path()));
        assert!(set.iter().all(BackupGeneration::is_timestamped));
    }

    #[test]
    fn test_timestamped_ignored_without_format() {
        let dir = TempDir::new().unwrap();
        let record = record(dir.path());
        fs::write(record.timestamped_backup("2024_06_01_00_00_00"), "x").unwrap();

        let set = GenerationSet::scan(&record, None).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_path_for_other_record() {
        let dir = TempDir::new().unwrap();
        let from = record(dir.path());
        let to = PathResolver::new(NamingPolicy::new(dir.path()))
            .resolve("renamed")
            .unwrap();

        let slot = BackupGeneration {
            path: from.soft_delete_backup().to_path_buf(),
            timestamp: Local::now(),
            kind: GenerationKind::Slot(Slot::SoftDeleteBackup),
        };
        assert_eq!(slot.path_for(&to), to.soft_delete_backup());

        let stamped = BackupGeneration {
            path: from.timestamped_backup("2024_06_01_00_00_00"),
            timestamp: Local::now(),
            kind: GenerationKind::Timestamped {
                suffix: "2024_06_01_00_00_00.old".to_string(),
            },
        };
        assert_eq!(
            stamped.path_for(&to),
            to.timestamped_backup("2024_06_01_00_00_00")
        );
    }
}
