//! Move every file below a root up into the root itself.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use crate::error::{ConfigError, OperationError};
use crate::fsops::{move_file, unique_destination};
use crate::types::{FlattenMove, FlattenReport};

/// Flatten `root`: every regular file in a subdirectory is moved into
/// `root`, renamed with a numeric suffix on collision.
///
/// Symlinks are moved as links, never followed. Subdirectories are left
/// in place, empty. With `dry_run` the moves are
/// planned (collisions included) but not performed.
///
/// # Errors
/// Returns an error if the root is not a directory.
pub fn flatten(root: &Path, dry_run: bool) -> io::Result<FlattenReport> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            ConfigError::NotADirectory(root.to_path_buf()),
        ));
    }

    // Collect first: moving while walking would feed files back into the walk.
    let nested: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(2)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() || e.file_type().is_symlink())
        .map(|e| e.into_path())
        .collect();

    let mut report = FlattenReport {
        root: root.to_path_buf(),
        dry_run,
        ..Default::default()
    };
    let mut planned: HashSet<PathBuf> = HashSet::new();

    for from in nested {
        let Some(file_name) = from.file_name().map(PathBuf::from) else {
            continue;
        };

        let (to, renamed) = unique_destination(root, &file_name, |p| {
            p.symlink_metadata().is_ok() || planned.contains(p)
        });
        planned.insert(to.clone());

        if !dry_run {
            if let Err(e) = move_file(&from, &to) {
                let err = OperationError::new("move", &from, e);
                warn!("Error moving: {}", err);
                report.failures.push((from, err.to_string()));
                continue;
            }
            info!("Moved {} -> {}", from.display(), to.display());
        }

        report.moves.push(FlattenMove { from, to, renamed });
    }

    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
