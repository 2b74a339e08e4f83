//! # Slotstore
//!
//! Crash-safe persistence of application objects to individual files.
//!
//! Every logical record (one serialized object) owns up to four physical
//! files, called slots:
//!
//! | Slot | Default file |
//! |------|--------------|
//! | `Primary` | `name.cfg` |
//! | `SoftDeletePrimary` | `name.cfg.trash` |
//! | `Backup` | `name.old` |
//! | `SoftDeleteBackup` | `name.old.trash` |
//!
//! Saving never destroys the last good version: the previous primary is
//! moved into the backup slot, the previous backup one step further back,
//! and the new content replaces the primary through a write-then-rename.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use slotstore::{JsonSerializer, Repository, RepositorySettings};
//!
//! let settings = RepositorySettings::new("/tmp/app").with_default_backups();
//! let repo = Repository::new(settings, JsonSerializer)?;
//!
//! let prefs = Arc::new(Preferences::default());
//! repo.save(&prefs, "prefs")?;
//! assert!(!repo.is_dirty(&*prefs, "prefs")?);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

pub mod config;
pub mod gc;
pub mod observability;
pub mod repository;
pub mod serialization;
pub mod storage;

pub use config::{BackupSettings, RepositorySettings};
pub use gc::{BackupRetention, PurgeResult};
pub use repository::{ObjectCache, Repository, SETTINGS_RECORD};
pub use serialization::{
    Format, FormatSerializer, JsonSerializer, Serializer, TomlSerializer, YamlSerializer,
};
pub use storage::{BackupGeneration, GenerationSet, NamingPolicy, PathResolver, RecordPaths, Slot};

/// Error type for slotstore operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NotFound` | Reading a record whose primary file does not exist |
/// | `WouldOverwrite` | Renaming onto an occupied slot without overwrite consent |
/// | `InvalidName` | Record name is empty, has illegal characters or a reserved extension |
/// | `Io` | Any filesystem operation fails |
/// | `Serialization` | The serializer rejects a value or a file's content |
/// | `TypeMismatch` | The cached object for a path was stored under another type |
/// | `Disposed` | The repository was closed |
/// | `InvalidInput` | Settings are malformed |
#[derive(Debug, ThisError)]
pub enum Error {
    /// No primary file exists for the record.
    #[error("record not found: {}", path.display())]
    NotFound {
        /// The primary path that was looked up.
        path: PathBuf,
    },

    /// A rename would replace an existing file.
    #[error("rename would overwrite existing file: {}", path.display())]
    WouldOverwrite {
        /// The first destination found occupied.
        path: PathBuf,
    },

    /// The record name cannot be mapped to a file path.
    #[error("invalid record name '{name}': {reason}")]
    InvalidName {
        /// The name as supplied by the caller.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// A filesystem operation failed.
    ///
    /// Raised when:
    /// - Writing the temporary file or replacing the primary fails
    /// - A slot move or delete fails (permissions, disk full, path too long)
    /// - The configured directory cannot be created
    #[error("operation '{operation}' failed on {}: {source}", path.display())]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The offending path.
        path: PathBuf,
        /// The underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Serializing or deserializing a value failed.
    #[error("{format} serialization failed: {cause}")]
    Serialization {
        /// Name of the serializer format.
        format: &'static str,
        /// The underlying cause.
        cause: String,
    },

    /// The cache holds an object of a different type for this path.
    #[error("cached object for {} is not a {expected}", path.display())]
    TypeMismatch {
        /// The record's primary path.
        path: PathBuf,
        /// The requested type.
        expected: &'static str,
    },

    /// The repository has been closed.
    #[error("repository has been closed")]
    Disposed,

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A settings file cannot be parsed
    /// - An extension is empty
    /// - Logging is initialized twice
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Builds an [`Error::Io`] for `operation` on `path`.
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for slotstore operations.
pub type Result<T> = std::result::Result<T, Error>;
