//! Garbage collection of backup generations.
//!
//! Every save that takes a backup runs a retention pass over the record's
//! generations. Retention can also be run on demand:
//!
//! ```rust,ignore
//! use slotstore::gc::BackupRetention;
//!
//! let generations = repo.backups("settings")?;
//! let result = BackupRetention::new(5, 0).purge(generations, true);
//! println!("{}", result.summary());
//! ```

mod retention;

pub use retention::{BackupRetention, PurgeResult};
