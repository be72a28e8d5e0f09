//! Single-root duplicate detection.
//!
//! Structure:
//! - Pure functions: keeper selection, grouping
//! - Effect functions: moving or deleting redundant files

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::OperationError;
use crate::fsops::{move_file, unique_destination};
use crate::hash::ImageProbe;
use crate::scanner::scan_with_progress;
use crate::types::{
    DedupeOptions, DedupeReport, Disposal, DisposalRecord, Disposition, DuplicateGroup,
    GroupOutcome, HashIndex, ImageRecord, ScanConfig,
};

/// Folder under the scanned root that receives moved duplicates.
///
/// Never scanned, so a second `--move` run finds nothing new.
pub const DUPLICATES_DIR: &str = "duplicates";

// ============================================================================
// PURE FUNCTIONS
// ============================================================================

/// Scan configuration for a dedupe run: the duplicates folder is excluded.
pub fn scan_config(root: &Path) -> ScanConfig {
    let mut config = ScanConfig::new(root);
    config.exclude_dirs = vec![PathBuf::from(DUPLICATES_DIR)];
    config
}

/// Index of the record to keep.
///
/// Largest pixel count wins, then largest file size. On equal keys the
/// earliest record wins.
///
/// # Panics
/// Panics if `records` is empty.
pub fn select_keeper(records: &[ImageRecord]) -> usize {
    assert!(!records.is_empty(), "cannot select a keeper from no records");

    let key = |r: &ImageRecord| (r.info.pixels(), r.info.size_bytes);
    let mut best = 0;
    for (i, record) in records.iter().enumerate().skip(1) {
        if key(record) > key(&records[best]) {
            best = i;
        }
    }
    best
}

/// Every bucket with more than one record, keeper chosen.
pub fn find_duplicates(index: &HashIndex) -> Vec<DuplicateGroup> {
    index
        .buckets()
        .filter(|bucket| bucket.len() > 1)
        .map(|bucket| {
            let keep = select_keeper(bucket);
            let redundant = bucket
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != keep)
                .map(|(_, r)| r.clone())
                .collect();
            DuplicateGroup {
                hash: bucket[keep].hash.clone(),
                keeper: bucket[keep].clone(),
                redundant,
            }
        })
        .collect()
}

// ============================================================================
// EFFECT FUNCTIONS
// ============================================================================

/// Apply the configured disposition to every redundant file.
///
/// A failure on one file is logged and recorded; the rest still run.
pub fn dispose(
    groups: &[DuplicateGroup],
    root: &Path,
    options: &DedupeOptions,
) -> Vec<GroupOutcome> {
    let mut mover = Mover::new(root.join(DUPLICATES_DIR), options.dry_run);

    groups
        .iter()
        .map(|group| GroupOutcome {
            hash: group.hash.clone(),
            keeper: group.keeper.path.clone(),
            redundant: group
                .redundant
                .iter()
                .map(|record| DisposalRecord {
                    path: record.path.clone(),
                    size_bytes: record.info.size_bytes,
                    disposal: match options.disposition {
                        Disposition::Report => Disposal::Reported,
                        Disposition::Move => mover.relocate(&record.path),
                        Disposition::Delete => delete(&record.path, options.dry_run),
                    },
                })
                .collect(),
        })
        .collect()
}

/// Scan `root`, group duplicates, and dispose of the redundant files.
///
/// # Errors
/// Returns an error if the root is not a directory.
pub fn run(
    root: &Path,
    options: &DedupeOptions,
    probe: &impl ImageProbe,
    on_progress: impl FnMut(usize, usize),
) -> io::Result<DedupeReport> {
    let index = scan_with_progress(&scan_config(root), probe, on_progress)?;
    let groups = find_duplicates(&index);
    let outcomes = dispose(&groups, root, options);

    Ok(DedupeReport {
        root: root.to_path_buf(),
        dry_run: options.dry_run,
        images_indexed: index.image_count(),
        bytes_recoverable: groups
            .iter()
            .flat_map(|g| &g.redundant)
            .map(|r| r.info.size_bytes)
            .sum(),
        groups: outcomes,
        skipped: index.skipped,
    })
}

// ============================================================================
// INTERNAL
// ============================================================================

/// Moves files into the duplicates folder, creating it on first use.
struct Mover {
    dir: PathBuf,
    dry_run: bool,
    dir_ready: bool,
    /// Destinations handed out this run, so dry runs resolve collisions
    /// the same way a real run would.
    planned: HashSet<PathBuf>,
}

impl Mover {
    fn new(dir: PathBuf, dry_run: bool) -> Self {
        Self {
            dir,
            dry_run,
            dir_ready: false,
            planned: HashSet::new(),
        }
    }

    fn relocate(&mut self, path: &Path) -> Disposal {
        let Some(file_name) = path.file_name() else {
            return Disposal::Failed {
                error: "path has no file name".to_string(),
            };
        };

        let (dest, _) = unique_destination(&self.dir, Path::new(file_name), |p| {
            p.exists() || self.planned.contains(p)
        });
        self.planned.insert(dest.clone());

        if self.dry_run {
            return Disposal::WouldMove { to: dest };
        }

        if !self.dir_ready {
            if let Err(e) = fs::create_dir_all(&self.dir) {
                let err = OperationError::new("create", &self.dir, e);
                warn!("Could not move {}: {}", path.display(), err);
                return Disposal::Failed {
                    error: err.to_string(),
                };
            }
            self.dir_ready = true;
        }

        match move_file(path, &dest) {
            Ok(()) => {
                info!("Moved {} to {}", path.display(), dest.display());
                Disposal::Moved { to: dest }
            }
            Err(e) => {
                let err = OperationError::new("move", path, e);
                warn!("Could not move: {}", err);
                Disposal::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}

fn delete(path: &Path, dry_run: bool) -> Disposal {
    if dry_run {
        return Disposal::WouldDelete;
    }

    match fs::remove_file(path) {
        Ok(()) => {
            info!("Deleted {}", path.display());
            Disposal::Deleted
        }
        Err(e) => {
            let err = OperationError::new("delete", path, e);
            warn!("Could not delete: {}", err);
            Disposal::Failed {
                error: err.to_string(),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
