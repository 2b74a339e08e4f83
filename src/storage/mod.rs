//! Storage layer.
//!
//! This module owns everything that touches individual files:
//! - **Paths**: maps a record name onto its four slot paths ([`PathResolver`])
//! - **Lifecycle**: save, soft-delete, hard-delete, backup and restore
//!   primitives on concrete paths ([`FileLifecycle`])
//! - **Generations**: the set of backup files a record currently has
//!   ([`GenerationSet`])

mod generations;
mod lifecycle;
mod paths;

pub use generations::{BackupGeneration, GenerationKind, GenerationSet};
pub use lifecycle::{FileLifecycle, StagedFile};
pub(crate) use lifecycle::try_exists;
pub use paths::{NamingPolicy, PathResolver, RecordPaths, Slot, with_appended_extension};
