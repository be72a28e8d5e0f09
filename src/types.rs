//! Domain types for photo-tidy.
//!
//! Scan results, duplicate groups, per-file outcomes and the validated
//! option sets each command runs with.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::error::ConfigError;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Perceptual fingerprint of an image's visual content.
///
/// Two records are "the same image" iff their hashes are byte-equal.
/// No distance threshold is applied anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHash(pub Vec<u8>);

impl ImageHash {
    /// Returns the hash as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ImageHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Serialize a path as a string, replacing invalid UTF-8 with U+FFFD.
fn lossy_path<P, S>(path: &P, serializer: S) -> Result<S::Ok, S::Error>
where
    P: AsRef<Path>,
    S: Serializer,
{
    serializer.serialize_str(&path.as_ref().to_string_lossy())
}

/// `(path, reason)` pairs with lossy paths.
fn lossy_path_pairs<S>(pairs: &[(PathBuf, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(pairs.iter().map(|(path, reason)| (path.to_string_lossy(), reason)))
}

/// Which perceptual hash to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// Average hash: each cell compared against the mean brightness.
    #[default]
    Mean,
    /// DCT-based hash (pHash).
    Dct,
    /// Horizontal gradient (dHash).
    Gradient,
}

// ============================================================================
// SCAN RESULTS
// ============================================================================

/// Pixel dimensions and byte size of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

impl ImageInfo {
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// One indexed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    #[serde(serialize_with = "lossy_path")]
    pub path: PathBuf,
    pub hash: ImageHash,
    #[serde(flatten)]
    pub info: ImageInfo,
}

/// Hash → records, for a single scanned root.
///
/// Buckets keep the order in which their hash was first seen, and records
/// keep the order in which they were found. `bucket[0]` is the first-seen
/// record for that hash.
#[derive(Debug, Default)]
pub struct HashIndex {
    buckets: Vec<Vec<ImageRecord>>,
    positions: HashMap<ImageHash, usize>,
    /// Files matching the allow-list that could not be hashed (path, reason).
    pub skipped: Vec<(PathBuf, String)>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under its hash.
    pub fn insert(&mut self, record: ImageRecord) {
        match self.positions.get(&record.hash) {
            Some(&i) => self.buckets[i].push(record),
            None => {
                self.positions.insert(record.hash.clone(), self.buckets.len());
                self.buckets.push(vec![record]);
            }
        }
    }

    pub fn contains(&self, hash: &ImageHash) -> bool {
        self.positions.contains_key(hash)
    }

    pub fn get(&self, hash: &ImageHash) -> Option<&[ImageRecord]> {
        self.positions.get(hash).map(|&i| self.buckets[i].as_slice())
    }

    /// Buckets in first-seen order. Never empty.
    pub fn buckets(&self) -> impl Iterator<Item = &[ImageRecord]> {
        self.buckets.iter().map(Vec::as_slice)
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of records across all buckets.
    pub fn image_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

/// A bucket with more than one member, keeper already chosen.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub hash: ImageHash,
    /// The record to retain.
    pub keeper: ImageRecord,
    /// Everything else in the bucket, in encounter order.
    pub redundant: Vec<ImageRecord>,
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// What happened (or would happen) to one redundant file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Disposal {
    /// Report-only mode: nothing done.
    Reported,
    Moved {
        #[serde(serialize_with = "lossy_path")]
        to: PathBuf,
    },
    Deleted,
    WouldMove {
        #[serde(serialize_with = "lossy_path")]
        to: PathBuf,
    },
    WouldDelete,
    Failed { error: String },
}

/// A redundant file and its disposal.
#[derive(Debug, Clone, Serialize)]
pub struct DisposalRecord {
    #[serde(serialize_with = "lossy_path")]
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub disposal: Disposal,
}

/// A duplicate group after disposition.
#[derive(Debug, Clone, Serialize)]
pub struct GroupOutcome {
    pub hash: ImageHash,
    #[serde(serialize_with = "lossy_path")]
    pub keeper: PathBuf,
    pub redundant: Vec<DisposalRecord>,
}

/// Result of a dedupe run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupeReport {
    #[serde(serialize_with = "lossy_path")]
    pub root: PathBuf,
    pub dry_run: bool,
    /// Images successfully hashed.
    pub images_indexed: usize,
    pub groups: Vec<GroupOutcome>,
    /// Total size of redundant files.
    pub bytes_recoverable: u64,
    /// Files that could not be hashed (path, reason).
    #[serde(serialize_with = "lossy_path_pairs")]
    pub skipped: Vec<(PathBuf, String)>,
}

/// A source image with no hash match in the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingItem {
    #[serde(serialize_with = "lossy_path")]
    pub source: PathBuf,
    /// Path relative to the source root.
    #[serde(serialize_with = "lossy_path")]
    pub relative: PathBuf,
    /// Same relative path under the target root.
    #[serde(serialize_with = "lossy_path")]
    pub destination: PathBuf,
}

/// What happened (or would happen) to one missing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Report-only mode.
    Missing,
    Copied,
    WouldCopy,
    /// Destination path already exists; left untouched.
    Conflict,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRecord {
    #[serde(flatten)]
    pub item: MissingItem,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Result of a compare run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompareReport {
    #[serde(serialize_with = "lossy_path")]
    pub source_root: PathBuf,
    #[serde(serialize_with = "lossy_path")]
    pub target_root: PathBuf,
    pub sync: bool,
    pub dry_run: bool,
    pub source_indexed: usize,
    pub target_indexed: usize,
    pub items: Vec<SyncRecord>,
    #[serde(serialize_with = "lossy_path_pairs")]
    pub skipped: Vec<(PathBuf, String)>,
}

/// One file move performed (or planned) by flatten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlattenMove {
    #[serde(serialize_with = "lossy_path")]
    pub from: PathBuf,
    #[serde(serialize_with = "lossy_path")]
    pub to: PathBuf,
    /// Destination was renamed to avoid a collision.
    pub renamed: bool,
}

/// Result of a flatten run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlattenReport {
    #[serde(serialize_with = "lossy_path")]
    pub root: PathBuf,
    pub dry_run: bool,
    pub moves: Vec<FlattenMove>,
    /// Moves that failed (from, reason).
    #[serde(serialize_with = "lossy_path_pairs")]
    pub failures: Vec<(PathBuf, String)>,
}

impl FlattenReport {
    /// Number of destinations that needed a numeric suffix.
    pub fn conflicts(&self) -> usize {
        self.moves.iter().filter(|m| m.renamed).count()
    }
}

/// Totals from a mirror walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorTotals {
    pub files: u64,
    pub bytes: u64,
}

impl std::ops::AddAssign for MirrorTotals {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable pretty output.
    #[default]
    Human,
    /// Machine-readable JSON.
    Json,
}

/// Configuration for indexing a directory tree.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    /// Lowercase extensions (without dot) considered images.
    pub extensions: Vec<String>,
    /// Directories (relative to root) that are never descended into.
    pub exclude_dirs: Vec<PathBuf>,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: crate::scanner::image_extensions(),
            exclude_dirs: Vec::new(),
        }
    }
}

/// What to do with redundant files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    Report,
    Move,
    Delete,
}

/// Validated dedupe options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupeOptions {
    pub disposition: Disposition,
    pub dry_run: bool,
}

impl DedupeOptions {
    /// Build options from raw flags. `--move` and `--delete` are exclusive.
    pub fn from_flags(move_files: bool, delete: bool, dry_run: bool) -> Result<Self, ConfigError> {
        let disposition = match (move_files, delete) {
            (true, true) => return Err(ConfigError::MoveAndDelete),
            (true, false) => Disposition::Move,
            (false, true) => Disposition::Delete,
            (false, false) => Disposition::Report,
        };
        Ok(Self { disposition, dry_run })
    }
}

/// Validated compare options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompareOptions {
    /// Copy missing items into the target.
    pub sync: bool,
    pub dry_run: bool,
}

/// Configuration for a mirror run.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    pub local_root: PathBuf,
    /// Normalized remote folder ("" = root).
    pub remote_folder: String,
    pub dry_run: bool,
    pub skip_existing_same_size: bool,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, hash: u8) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            hash: ImageHash(vec![hash; 8]),
            info: ImageInfo::default(),
        }
    }

    #[test]
    fn hash_hex_is_lowercase() {
        let hash = ImageHash(vec![0xAB, 0x01]);
        assert_eq!(hash.to_hex(), "ab01");
        assert_eq!(hash.to_string(), "ab01");
    }

    #[test]
    fn index_groups_by_hash_in_first_seen_order() {
        let mut index = HashIndex::new();
        index.insert(record("/a.jpg", 2));
        index.insert(record("/b.jpg", 1));
        index.insert(record("/c.jpg", 2));

        let buckets: Vec<_> = index.buckets().collect();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0][0].path, PathBuf::from("/a.jpg"));
        assert_eq!(buckets[0][1].path, PathBuf::from("/c.jpg"));
        assert_eq!(buckets[1][0].path, PathBuf::from("/b.jpg"));
        assert_eq!(index.image_count(), 3);
    }

    #[test]
    fn index_lookup() {
        let mut index = HashIndex::new();
        index.insert(record("/a.jpg", 7));

        assert!(index.contains(&ImageHash(vec![7; 8])));
        assert!(!index.contains(&ImageHash(vec![8; 8])));
        assert_eq!(index.get(&ImageHash(vec![7; 8])).map(|b| b.len()), Some(1));
    }

    #[test]
    fn move_and_delete_is_rejected() {
        let err = DedupeOptions::from_flags(true, true, false).unwrap_err();
        assert!(matches!(err, ConfigError::MoveAndDelete));
    }

    #[test]
    fn flags_map_to_disposition() {
        let opts = DedupeOptions::from_flags(true, false, true).unwrap();
        assert_eq!(opts.disposition, Disposition::Move);
        assert!(opts.dry_run);

        let opts = DedupeOptions::from_flags(false, true, false).unwrap();
        assert_eq!(opts.disposition, Disposition::Delete);

        let opts = DedupeOptions::from_flags(false, false, false).unwrap();
        assert_eq!(opts.disposition, Disposition::Report);
    }

    #[test]
    fn image_info_pixels_does_not_overflow() {
        let info = ImageInfo { width: u32::MAX, height: 2, size_bytes: 0 };
        assert_eq!(info.pixels(), u64::from(u32::MAX) * 2);
    }
}
