//! Record rename.
//!
//! A record is renamed by moving every file it owns (all four slots and any
//! timestamped backups) to the matching path of the new name. Collisions are
//! detected before anything moves; a failure part-way rolls back the moves
//! already made. When overwriting, existing destination files are set aside
//! first and only deleted once every move has succeeded.

use crate::storage::{FileLifecycle, GenerationSet, RecordPaths, Slot, try_exists};
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// The moves needed to rename one record.
#[derive(Debug, Clone, Default)]
pub(crate) struct RenamePlan {
    moves: Vec<(PathBuf, PathBuf)>,
}

impl RenamePlan {
    /// Lists the files of `from` that exist and where each one goes.
    pub(crate) fn build(
        from: &RecordPaths,
        to: &RecordPaths,
        timestamp_format: Option<&str>,
    ) -> Result<Self> {
        let mut moves: Vec<(PathBuf, PathBuf)> = Vec::new();
        for slot in Slot::ALL {
            let source = from.path(slot);
            if try_exists(source)? {
                moves.push((source.to_path_buf(), to.path(slot).to_path_buf()));
            }
        }

        if timestamp_format.is_some() {
            let generations = GenerationSet::scan(from, timestamp_format)?;
            moves.extend(
                generations
                    .iter()
                    .filter(|g| g.is_timestamped())
                    .map(|g| (g.path.clone(), g.path_for(to))),
            );
        }

        Ok(Self { moves })
    }

    /// Returns the number of files to move.
    pub(crate) fn len(&self) -> usize {
        self.moves.len()
    }

    /// Returns the first destination that already exists.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a destination cannot be looked up.
    pub(crate) fn first_collision(&self) -> Result<Option<&Path>> {
        for (_, destination) in &self.moves {
            if try_exists(destination)? {
                return Ok(Some(destination));
            }
        }
        Ok(None)
    }

    /// Moves every file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WouldOverwrite`] without moving anything if a
    /// destination exists and `overwrite` is false. If a move fails, moves
    /// already made are reversed, overwritten destinations get their old
    /// content back, and the move error is returned.
    pub(crate) fn execute(&self, lifecycle: &FileLifecycle, overwrite: bool) -> Result<()> {
        if !overwrite {
            if let Some(path) = self.first_collision()? {
                return Err(Error::WouldOverwrite {
                    path: path.to_path_buf(),
                });
            }
        }

        let mut displaced = Vec::new();
        for (done, (source, destination)) in self.moves.iter().enumerate() {
            let result = if overwrite {
                set_aside(lifecycle, destination, &mut displaced)
            } else {
                Ok(())
            }
            .and_then(|()| lifecycle.move_file(source, destination, overwrite));

            if let Err(e) = result {
                self.roll_back(lifecycle, done);
                put_back(lifecycle, &displaced);
                return Err(e);
            }
        }

        for (_, aside) in &displaced {
            if let Err(e) = lifecycle.hard_delete(aside) {
                warn!(path = %aside.display(), error = %e, "Failed to remove overwritten file");
            }
        }
        Ok(())
    }

    fn roll_back(&self, lifecycle: &FileLifecycle, done: usize) {
        for (source, destination) in self.moves[..done].iter().rev() {
            if let Err(e) = lifecycle.move_file(destination, source, false) {
                warn!(
                    from = %destination.display(),
                    to = %source.display(),
                    error = %e,
                    "Failed to roll back rename"
                );
            }
        }
    }
}

/// Moves an existing destination file to its temp path, recording where it
/// went. Directories are left alone so the move itself reports them.
fn set_aside(
    lifecycle: &FileLifecycle,
    destination: &Path,
    displaced: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<()> {
    match fs::symlink_metadata(destination) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => {
            let aside = lifecycle.temp_path(destination);
            lifecycle.move_file(destination, &aside, true)?;
            displaced.push((destination.to_path_buf(), aside));
            Ok(())
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io("stat_file", destination, e)),
    }
}

fn put_back(lifecycle: &FileLifecycle, displaced: &[(PathBuf, PathBuf)]) {
    for (destination, aside) in displaced.iter().rev() {
        if let Err(e) = lifecycle.move_file(aside, destination, false) {
            warn!(
                from = %aside.display(),
                to = %destination.display(),
                error = %e,
                "Failed to restore overwritten file"
            );
        }
    }
}
