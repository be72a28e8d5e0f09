//! Directory indexing.
//!
//! Walks a tree, fingerprints every allow-listed image and groups the
//! results by hash. Read-only; files that cannot be decoded are logged
//! and recorded as skipped.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::ConfigError;
use crate::hash::ImageProbe;
use crate::types::{HashIndex, ImageRecord, ScanConfig};

/// Extensions the `image` crate decodes (lowercase, no dot).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "gif", "tiff", "tif", "webp",
];

/// Extensions decoded through libheif.
pub const HEIF_EXTENSIONS: &[&str] = &["heic", "heif"];

/// The default allow-list: every extension this build can hash.
///
/// HEIC/HEIF files are only listed when built with the `heif` feature,
/// so a build without libheif never indexes them as undecodable.
pub fn image_extensions() -> Vec<String> {
    let heif: &[&str] = if cfg!(feature = "heif") { HEIF_EXTENSIONS } else { &[] };
    IMAGE_EXTENSIONS
        .iter()
        .chain(heif)
        .map(|ext| ext.to_string())
        .collect()
}

/// Index every image under `config.root`.
///
/// # Errors
/// Returns an error if the root is not a directory.
pub fn scan(config: &ScanConfig, probe: &impl ImageProbe) -> io::Result<HashIndex> {
    scan_with_progress(config, probe, |_, _| {})
}

/// Like [`scan`], calling `on_progress(images_seen, images_indexed)` after
/// each image candidate.
///
/// # Errors
/// Returns an error if the root is not a directory.
pub fn scan_with_progress(
    config: &ScanConfig,
    probe: &impl ImageProbe,
    mut on_progress: impl FnMut(usize, usize),
) -> io::Result<HashIndex> {
    ensure_dir(&config.root)?;

    let excluded: Vec<PathBuf> = config
        .exclude_dirs
        .iter()
        .map(|dir| config.root.join(dir))
        .collect();

    let mut index = HashIndex::new();
    let mut seen = 0;

    let walker = WalkDir::new(&config.root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, &excluded));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !has_image_extension(path, &config.extensions) {
            debug!("Skipping {}", path.display());
            continue;
        }

        seen += 1;
        debug!("[{}] Indexing: {}", seen, path.display());

        match probe.probe(path) {
            Ok((hash, info)) => index.insert(ImageRecord {
                path: path.to_path_buf(),
                hash,
                info,
            }),
            Err(e) => {
                warn!("Could not process {}", e);
                index.skipped.push((path.to_path_buf(), e.to_string()));
            }
        }

        on_progress(seen, index.image_count());
    }

    Ok(index)
}

/// Count allow-listed image files under `root` without decoding them.
///
/// # Errors
/// Returns an error if the root is not a directory.
pub fn count_images(root: &Path, extensions: &[String]) -> io::Result<usize> {
    ensure_dir(root)?;

    Ok(WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_image_extension(e.path(), extensions))
        .count())
}

/// Case-insensitive extension check against a lowercase allow-list.
pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

// ============================================================================
// INTERNAL
// ============================================================================

fn is_excluded(entry: &DirEntry, excluded: &[PathBuf]) -> bool {
    entry.file_type().is_dir() && excluded.iter().any(|dir| entry.path() == dir)
}

fn ensure_dir(root: &Path) -> io::Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            ConfigError::NotADirectory(root.to_path_buf()),
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::PerceptualHasher;
    use crate::hash::tests::write_split_png;
    use crate::types::HashAlgorithm;
    use std::collections::{BTreeSet, HashMap};
    use std::fs;
    use tempfile::TempDir;

    fn hasher() -> PerceptualHasher {
        PerceptualHasher::new(HashAlgorithm::Mean)
    }

    /// Hash → set of paths, ignoring order.
    fn membership(index: &HashIndex) -> HashMap<String, BTreeSet<PathBuf>> {
        index
            .buckets()
            .map(|bucket| {
                (
                    bucket[0].hash.to_hex(),
                    bucket.iter().map(|r| r.path.clone()).collect(),
                )
            })
            .collect()
    }

    /// Helper: two copies of one image, one different image, one non-image.
    fn setup_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_split_png(&dir.path().join("a.png"), 32, 32, true);
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::copy(dir.path().join("a.png"), dir.path().join("nested/a copy.PNG")).unwrap();
        write_split_png(&dir.path().join("b.png"), 32, 32, false);
        fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();
        dir
    }

    #[test]
    fn test_scan_groups_identical_images() {
        let dir = setup_test_dir();
        let index = scan(&ScanConfig::new(dir.path()), &hasher()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.image_count(), 3);
        let sizes: Vec<usize> = index.buckets().map(|b| b.len()).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }

    #[test]
    fn test_scan_ignores_non_images() {
        let dir = setup_test_dir();
        let index = scan(&ScanConfig::new(dir.path()), &hasher()).unwrap();

        let all: Vec<PathBuf> = index
            .buckets()
            .flat_map(|b| b.iter().map(|r| r.path.clone()))
            .collect();
        assert!(!all.contains(&dir.path().join("notes.txt")));
        assert!(index.skipped.is_empty());
    }

    #[test]
    fn test_scan_respects_custom_allow_list() {
        let dir = setup_test_dir();
        let mut config = ScanConfig::new(dir.path());
        config.extensions = vec!["jpg".to_string()];

        let index = scan(&config, &hasher()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_scan_is_deterministic() {
        let dir = setup_test_dir();
        let config = ScanConfig::new(dir.path());

        let first = scan(&config, &hasher()).unwrap();
        let second = scan(&config, &hasher()).unwrap();

        assert_eq!(membership(&first), membership(&second));
    }

    #[test]
    fn test_scan_records_undecodable_files() {
        let dir = TempDir::new().unwrap();
        write_split_png(&dir.path().join("good.png"), 16, 16, true);
        fs::write(dir.path().join("corrupt.jpg"), b"garbage").unwrap();

        let index = scan(&ScanConfig::new(dir.path()), &hasher()).unwrap();

        assert_eq!(index.image_count(), 1);
        assert_eq!(index.skipped.len(), 1);
        assert_eq!(index.skipped[0].0, dir.path().join("corrupt.jpg"));
    }

    #[test]
    fn test_scan_skips_excluded_subtree() {
        let dir = TempDir::new().unwrap();
        write_split_png(&dir.path().join("keep.png"), 16, 16, true);
        write_split_png(&dir.path().join("duplicates/old.png"), 16, 16, true);

        let mut config = ScanConfig::new(dir.path());
        config.exclude_dirs = vec![PathBuf::from("duplicates")];

        let index = scan(&config, &hasher()).unwrap();
        assert_eq!(index.image_count(), 1);
    }

    #[test]
    fn test_scan_reports_progress() {
        let dir = setup_test_dir();
        let mut calls = Vec::new();

        scan_with_progress(&ScanConfig::new(dir.path()), &hasher(), |seen, indexed| {
            calls.push((seen, indexed))
        })
        .unwrap();

        assert_eq!(calls.last(), Some(&(3, 3)));
    }

    #[test]
    fn test_scan_rejects_missing_root() {
        let result = scan(&ScanConfig::new("/nonexistent/root"), &hasher());
        assert!(result.is_err());
    }

    // --- count_images ---

    #[test]
    fn test_count_images_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.JPG"), b"").unwrap();
        fs::write(dir.path().join("b.jpeg"), b"").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.Png"), b"").unwrap();
        fs::write(dir.path().join("sub/d.txt"), b"").unwrap();

        let extensions = ScanConfig::new(dir.path()).extensions;
        assert_eq!(count_images(dir.path(), &extensions).unwrap(), 3);
    }

    #[test]
    fn test_count_images_rejects_file_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("x.jpg");
        fs::write(&file, b"").unwrap();

        assert!(count_images(&file, &["jpg".to_string()]).is_err());
    }

    #[test]
    fn test_default_allow_list_matches_build() {
        let exts = image_extensions();
        assert!(exts.contains(&"jpg".to_string()));
        assert_eq!(exts.contains(&"heic".to_string()), cfg!(feature = "heif"));
    }

    #[test]
    fn test_has_image_extension() {
        let exts = vec!["jpg".to_string(), "heic".to_string()];
        assert!(has_image_extension(Path::new("/x/IMG_1.HEIC"), &exts));
        assert!(has_image_extension(Path::new("photo.jpg"), &exts));
        assert!(!has_image_extension(Path::new("photo.jpg.txt"), &exts));
        assert!(!has_image_extension(Path::new("jpg"), &exts));
    }
}
