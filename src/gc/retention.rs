//! Backup retention.
//!
//! Prunes the oldest backup generations of a record once they exceed a
//! count or age limit. Both limits are optional; a zero disables a limit.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotstore::gc::BackupRetention;
//! use slotstore::storage::GenerationSet;
//!
//! let retention = BackupRetention::new(3, 30);
//! let set = GenerationSet::scan(&paths, None)?;
//!
//! // Dry run to see what would be pruned
//! let result = retention.purge(set.clone(), true);
//! println!("{}", result.summary());
//!
//! // Actually prune
//! let result = retention.purge(set, false);
//! ```

use crate::storage::{BackupGeneration, GenerationSet};
use chrono::{DateTime, Local, TimeDelta};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Seconds in one retention day.
const SECONDS_PER_DAY: i64 = 86_400;

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Count and age limits for backup generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupRetention {
    max_count: usize,
    max_age_days: u32,
}

impl BackupRetention {
    /// Creates a retention policy; zero disables a limit.
    #[must_use]
    pub const fn new(max_count: usize, max_age_days: u32) -> Self {
        Self {
            max_count,
            max_age_days,
        }
    }

    /// Returns the maximum number of generations (0 = unlimited).
    #[must_use]
    pub const fn max_count(&self) -> usize {
        self.max_count
    }

    /// Returns the maximum generation age in days (0 = unlimited).
    #[must_use]
    pub const fn max_age_days(&self) -> u32 {
        self.max_age_days
    }

    /// Returns `true` when neither limit is set.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.max_count == 0 && self.max_age_days == 0
    }

    /// Returns the generations to delete, oldest first.
    ///
    /// While the count limit is exceeded the oldest generation is selected,
    /// then while the oldest remaining generation is older than the age
    /// limit it is selected too. `generations` must be sorted oldest first.
    #[must_use]
    pub fn select_expired(
        &self,
        generations: &[BackupGeneration],
        now: DateTime<Local>,
    ) -> Vec<BackupGeneration> {
        let mut expired = 0;

        if self.max_count > 0 {
            expired = generations.len().saturating_sub(self.max_count);
        }

        if self.max_age_days > 0 {
            let max_age = TimeDelta::seconds(i64::from(self.max_age_days) * SECONDS_PER_DAY);
            expired += generations[expired..]
                .iter()
                .take_while(|g| now.signed_duration_since(g.timestamp) > max_age)
                .count();
        }

        generations[..expired].to_vec()
    }

    /// Deletes expired generations from `set`.
    ///
    /// A generation that cannot be deleted is logged and skipped; it does
    /// not stop the purge.
    #[instrument(
        name = "slotstore.gc.retention",
        skip(self, set),
        fields(
            component = "gc",
            operation = "retention",
            dry_run = dry_run,
            max_count = self.max_count,
            max_age_days = self.max_age_days
        )
    )]
    pub fn purge(&self, set: GenerationSet, dry_run: bool) -> PurgeResult {
        let start = Instant::now();
        let mut result = PurgeResult {
            generations_checked: set.len(),
            dry_run,
            ..Default::default()
        };

        if self.is_disabled() || set.is_empty() {
            return result;
        }

        for generation in self.select_expired(set.as_slice(), Local::now()) {
            if dry_run {
                result.deleted.push(generation.path);
                continue;
            }

            match fs::remove_file(&generation.path) {
                Ok(()) => {
                    debug!(path = %generation.path.display(), "Pruned backup generation");
                    result.deleted.push(generation.path);
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {},
                Err(e) => {
                    warn!(
                        path = %generation.path.display(),
                        error = %e,
                        "Failed to prune backup generation"
                    );
                    result.failed += 1;
                },
            }
        }

        result.duration_ms = duration_to_millis(start.elapsed());

        if !dry_run && !result.deleted.is_empty() {
            metrics::counter!("slotstore_backups_pruned_total")
                .increment(u64::try_from(result.deleted.len()).unwrap_or(u64::MAX));
        }
        metrics::histogram!("slotstore_retention_duration_ms")
            .record(u64_to_f64(result.duration_ms));

        if result.has_deletions() {
            info!(
                generations_checked = result.generations_checked,
                generations_deleted = result.deleted.len(),
                duration_ms = result.duration_ms,
                dry_run,
                "Backup retention completed"
            );
        }

        result
    }
}

/// Result of a retention purge.
#[derive(Debug, Clone, Default)]
pub struct PurgeResult {
    /// Number of generations considered.
    pub generations_checked: usize,

    /// Paths that were (or would be) deleted.
    pub deleted: Vec<PathBuf>,

    /// Number of generations that could not be deleted.
    pub failed: usize,

    /// Whether this was a dry run (no actual changes made).
    pub dry_run: bool,

    /// Duration of the purge in milliseconds.
    pub duration_ms: u64,
}

impl PurgeResult {
    /// Returns the number of generations that were (or would be) deleted.
    #[must_use]
    pub fn generations_deleted(&self) -> usize {
        self.deleted.len()
    }

    /// Returns `true` if any generation was (or would be) deleted.
    #[must_use]
    pub fn has_deletions(&self) -> bool {
        !self.deleted.is_empty()
    }

    /// Returns a human-readable summary of the purge.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.deleted.is_empty() {
            return format!(
                "No expired backups found ({} generations checked in {}ms)",
                self.generations_checked, self.duration_ms
            );
        }

        let action = if self.dry_run { "would delete" } else { "deleted" };
        let mut summary = format!(
            "{action} {} expired backups - checked {} in {}ms",
            self.deleted.len(),
            self.generations_checked,
            self.duration_ms
        );
        if self.failed > 0 {
            summary.push_str(&format!(" ({} failed)", self.failed));
        }
        summary
    }
}
