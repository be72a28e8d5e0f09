//! Filesystem helpers shared by dedupe, compare and flatten.

use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// Pick a free path for `file_name` inside `dir`.
///
/// Tries `dir/name.ext`, then `dir/name_1.ext`, `dir/name_2.ext`, ...
/// `taken` decides whether a candidate is occupied, so dry runs can count
/// destinations they have only planned. Returns the path and whether a
/// suffix was needed.
pub fn unique_destination(
    dir: &Path,
    file_name: &Path,
    taken: impl Fn(&Path) -> bool,
) -> (PathBuf, bool) {
    let candidate = dir.join(file_name);
    if !taken(&candidate) {
        return (candidate, false);
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !taken(&candidate) {
            return (candidate, true);
        }
        counter += 1;
    }
}

/// Move a file, falling back to copy + remove when rename cannot cross
/// filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_preserving(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

/// Copy a file with its permissions and access/modification times.
///
/// Permissions are applied last so a read-only source still copies. If
/// anything fails once `to` has been created, `to` is removed again.
pub fn copy_preserving(from: &Path, to: &Path) -> io::Result<u64> {
    let mut source = File::open(from)?;
    let metadata = source.metadata()?;
    let dest = File::create(to)?;

    match write_copy(&mut source, dest, &metadata, to) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            let _ = fs::remove_file(to);
            Err(e)
        }
    }
}

fn write_copy(
    source: &mut File,
    mut dest: File,
    metadata: &Metadata,
    to: &Path,
) -> io::Result<u64> {
    let bytes = io::copy(source, &mut dest)?;

    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    dest.set_times(times)?;
    drop(dest);

    fs::set_permissions(to, metadata.permissions())?;
    Ok(bytes)
}

// ============================================================================
// TESTS
// ============================================================================
