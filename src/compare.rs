//! Two-root reconciliation.
//!
//! Finds images in a source tree whose fingerprint never occurs in a
//! target tree, and optionally copies them across under the same
//! relative path.

use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

use crate::error::OperationError;
use crate::fsops::copy_preserving;
use crate::hash::ImageProbe;
use crate::scanner::scan_with_progress;
use crate::types::{
    CompareOptions, CompareReport, HashIndex, MissingItem, ScanConfig, SyncOutcome, SyncRecord,
};

/// Source images with no hash match in the target.
///
/// Only the first-seen record of each source hash is considered, so two
/// source files with the same fingerprint produce one missing item.
pub fn find_missing(
    source: &HashIndex,
    source_root: &Path,
    target: &HashIndex,
    target_root: &Path,
) -> Vec<MissingItem> {
    source
        .buckets()
        .filter(|bucket| !target.contains(&bucket[0].hash))
        .map(|bucket| {
            let source_path = &bucket[0].path;
            let relative = source_path
                .strip_prefix(source_root)
                .unwrap_or(source_path)
                .to_path_buf();
            MissingItem {
                source: source_path.clone(),
                destination: target_root.join(&relative),
                relative,
            }
        })
        .collect()
}

/// Report or copy each missing item.
///
/// Existing destinations are never overwritten; they are reported as
/// conflicts. Copy failures are logged and recorded.
pub fn sync_missing(items: Vec<MissingItem>, options: &CompareOptions) -> Vec<SyncRecord> {
    items
        .into_iter()
        .map(|item| {
            let outcome = if !options.sync {
                SyncOutcome::Missing
            } else if item.destination.exists() {
                warn!(
                    "Not overwriting existing {} (different image, same path)",
                    item.destination.display()
                );
                SyncOutcome::Conflict
            } else if options.dry_run {
                SyncOutcome::WouldCopy
            } else {
                copy_item(&item)
            };
            SyncRecord { item, outcome }
        })
        .collect()
}

/// Index both roots, find missing items, and report or copy them.
///
/// A target root that does not exist yet is treated as empty.
///
/// # Errors
/// Returns an error if the source root is not a directory, or the target
/// exists but is not a directory.
pub fn run(
    source_root: &Path,
    target_root: &Path,
    options: &CompareOptions,
    probe: &impl ImageProbe,
    mut on_progress: impl FnMut(&Path, usize, usize),
) -> io::Result<CompareReport> {
    let source = scan_with_progress(&ScanConfig::new(source_root), probe, |seen, indexed| {
        on_progress(source_root, seen, indexed)
    })?;

    let target = if target_root.exists() {
        scan_with_progress(&ScanConfig::new(target_root), probe, |seen, indexed| {
            on_progress(target_root, seen, indexed)
        })?
    } else {
        info!("Target {} does not exist yet", target_root.display());
        HashIndex::new()
    };

    let missing = find_missing(&source, source_root, &target, target_root);
    let items = sync_missing(missing, options);

    let mut skipped = source.skipped.clone();
    skipped.extend(target.skipped.iter().cloned());

    Ok(CompareReport {
        source_root: source_root.to_path_buf(),
        target_root: target_root.to_path_buf(),
        sync: options.sync,
        dry_run: options.dry_run,
        source_indexed: source.image_count(),
        target_indexed: target.image_count(),
        items,
        skipped,
    })
}

// ============================================================================
// INTERNAL
// ============================================================================

fn copy_item(item: &MissingItem) -> SyncOutcome {
    let result = item
        .destination
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| copy_preserving(&item.source, &item.destination));

    match result {
        Ok(_) => {
            info!("Copied {}", item.relative.display());
            SyncOutcome::Copied
        }
        Err(e) => {
            let err = OperationError::new("copy", &item.source, e);
            warn!("Could not copy: {}", err);
            SyncOutcome::Failed {
                error: err.to_string(),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
