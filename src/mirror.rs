//! Mirror a remote folder tree to local disk.
//!
//! Structure:
//! - `RemoteStore`: the listing/download capability the walk needs
//! - Pure functions: remote path normalization, local path mapping
//! - Effect functions: the recursive walk and per-file download
//!
//! Sequential throughout. Errors are logged and the walk moves on; there
//! is no retry.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use log::warn;

use crate::error::RemoteError;
use crate::types::{MirrorOptions, MirrorTotals};

// ============================================================================
// REMOTE CAPABILITY
// ============================================================================

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntry {
    File { path: String, size: u64 },
    Folder { path: String },
    /// Anything else the remote reports (e.g. deleted entries).
    Other { path: String },
}

/// One page of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<RemoteEntry>,
    /// Opaque token for the next page.
    pub cursor: String,
    pub has_more: bool,
}

/// The account a token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub display_name: String,
    pub email: String,
}

/// Paginated listing and download of a remote file tree.
///
/// Paths are lowercase, `/`-separated, rooted at `""`.
pub trait RemoteStore {
    fn current_account(&self) -> Result<Account, RemoteError>;

    /// First page of a non-recursive listing.
    fn list_folder(&self, path: &str) -> Result<ListPage, RemoteError>;

    /// Next page after `cursor`.
    fn list_folder_continue(&self, cursor: &str) -> Result<ListPage, RemoteError>;

    /// Stream a file's contents into `out`, returning bytes written.
    fn download(&self, path: &str, out: &mut dyn Write) -> Result<u64, RemoteError>;
}

/// Progress notifications from a mirror walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    Listing { folder: String },
    MorePages { folder: String },
    /// Dry run: file that would be downloaded.
    Found { path: String, size: u64 },
    SkippedExisting { path: String },
    Downloading { path: String, local: PathBuf },
    Unsupported { path: String },
}

// ============================================================================
// PURE FUNCTIONS
// ============================================================================

/// Normalize a user-supplied remote folder.
///
/// `""` and `"/"` mean the root (`""`). Otherwise the result starts with
/// `/` and has no trailing `/`.
pub fn normalize_remote_folder(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() || path == "/" {
        return String::new();
    }

    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Map a remote path to its local location under `local_root`.
///
/// Matching is case-insensitive. When the path lies under `remote_base`,
/// the base is stripped: with base `/Photos`, `/photos/2020/img.jpg`
/// lands at `<local_root>/2020/img.jpg`. Only plain path components are
/// kept, so a remote path can never escape `local_root`.
pub fn local_path_for(local_root: &Path, remote_path: &str, remote_base: &str) -> PathBuf {
    let remote_path = remote_path.to_lowercase();
    let remote_base = remote_base.to_lowercase();

    let relative = if remote_base.is_empty() {
        Path::new(&remote_path)
    } else {
        Path::new(&remote_path)
            .strip_prefix(&remote_base)
            .unwrap_or(Path::new(&remote_path))
    };

    let mut local = local_root.to_path_buf();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            local.push(part);
        }
    }
    local
}

// ============================================================================
// EFFECT FUNCTIONS
// ============================================================================

/// Mirror `options.remote_folder` into `options.local_root`.
///
/// Returns the number of files and bytes downloaded (or, in dry-run,
/// found).
pub fn mirror(
    store: &impl RemoteStore,
    options: &MirrorOptions,
    mut on_event: impl FnMut(MirrorEvent),
) -> MirrorTotals {
    walk_folder(store, &options.remote_folder, options, &mut on_event)
}

fn walk_folder(
    store: &impl RemoteStore,
    folder: &str,
    options: &MirrorOptions,
    on_event: &mut impl FnMut(MirrorEvent),
) -> MirrorTotals {
    let display = if folder.is_empty() { "/" } else { folder };
    on_event(MirrorEvent::Listing {
        folder: display.to_string(),
    });

    let mut totals = MirrorTotals::default();
    let mut page = match store.list_folder(folder) {
        Ok(page) => page,
        Err(e) => {
            warn!("Error listing '{}': {}", display, e);
            return totals;
        }
    };

    loop {
        for entry in &page.entries {
            match entry {
                RemoteEntry::Folder { path } => {
                    if !options.dry_run {
                        let local = local_path_for(&options.local_root, path, &options.remote_folder);
                        if let Err(e) = fs::create_dir_all(&local) {
                            warn!("Could not create {}: {}", local.display(), e);
                        }
                    }
                    totals += walk_folder(store, path, options, on_event);
                }
                RemoteEntry::File { path, size } => {
                    totals += download_file(store, path, *size, options, on_event);
                }
                RemoteEntry::Other { path } => {
                    on_event(MirrorEvent::Unsupported { path: path.clone() });
                }
            }
        }

        if !page.has_more {
            break;
        }

        on_event(MirrorEvent::MorePages {
            folder: display.to_string(),
        });
        page = match store.list_folder_continue(&page.cursor) {
            Ok(next) => next,
            Err(e) => {
                warn!("Error continuing listing of '{}': {}", display, e);
                break;
            }
        };
    }

    totals
}

fn download_file(
    store: &impl RemoteStore,
    path: &str,
    size: u64,
    options: &MirrorOptions,
    on_event: &mut impl FnMut(MirrorEvent),
) -> MirrorTotals {
    let local = local_path_for(&options.local_root, path, &options.remote_folder);

    if options.dry_run {
        on_event(MirrorEvent::Found {
            path: path.to_string(),
            size,
        });
        return MirrorTotals { files: 1, bytes: size };
    }

    if options.skip_existing_same_size {
        if let Ok(metadata) = fs::metadata(&local) {
            if metadata.len() == size {
                on_event(MirrorEvent::SkippedExisting {
                    path: path.to_string(),
                });
                return MirrorTotals::default();
            }
        }
    }

    on_event(MirrorEvent::Downloading {
        path: path.to_string(),
        local: local.clone(),
    });

    match fetch_to(store, path, &local) {
        Ok(bytes) => MirrorTotals { files: 1, bytes },
        Err(e) => {
            warn!("Error downloading {}: {}", path, e);
            // Partial downloads are removed.
            let _ = fs::remove_file(&local);
            MirrorTotals::default()
        }
    }
}

fn fetch_to(store: &impl RemoteStore, path: &str, local: &Path) -> Result<u64, RemoteError> {
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(local)?);
    let bytes = store.download(path, &mut out)?;
    out.flush()?;
    Ok(bytes)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::io;
    use tempfile::TempDir;

    /// In-memory remote: folder → pages, file → bytes.
    #[derive(Default)]
    struct FakeStore {
        pages: HashMap<String, Vec<ListPage>>,
        files: HashMap<String, Vec<u8>>,
        broken_folders: HashSet<String>,
        broken_files: HashSet<String>,
        downloads: RefCell<Vec<String>>,
    }

    impl FakeStore {
        fn folder(mut self, path: &str, pages: Vec<Vec<RemoteEntry>>) -> Self {
            let count = pages.len();
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(i, entries)| ListPage {
                    entries,
                    cursor: format!("{}#{}", path, i + 1),
                    has_more: i + 1 < count,
                })
                .collect();
            self.pages.insert(path.to_string(), pages);
            self
        }

        fn file(mut self, path: &str, content: &[u8]) -> Self {
            self.files.insert(path.to_string(), content.to_vec());
            self
        }
    }

    impl RemoteStore for FakeStore {
        fn current_account(&self) -> Result<Account, RemoteError> {
            Ok(Account {
                display_name: "Test".to_string(),
                email: "test@example.com".to_string(),
            })
        }

        fn list_folder(&self, path: &str) -> Result<ListPage, RemoteError> {
            if self.broken_folders.contains(path) {
                return Err(RemoteError::Io(io::Error::other("listing failed")));
            }
            self.pages
                .get(path)
                .and_then(|pages| pages.first().cloned())
                .ok_or_else(|| RemoteError::Io(io::Error::other("no such folder")))
        }

        fn list_folder_continue(&self, cursor: &str) -> Result<ListPage, RemoteError> {
            let (path, index) = cursor.rsplit_once('#').unwrap();
            let index: usize = index.parse().unwrap();
            self.pages
                .get(path)
                .and_then(|pages| pages.get(index).cloned())
                .ok_or_else(|| RemoteError::Io(io::Error::other("bad cursor")))
        }

        fn download(&self, path: &str, out: &mut dyn Write) -> Result<u64, RemoteError> {
            self.downloads.borrow_mut().push(path.to_string());
            if self.broken_files.contains(path) {
                out.write_all(b"partial")?;
                return Err(RemoteError::Io(io::Error::other("connection reset")));
            }
            let content = self
                .files
                .get(path)
                .ok_or_else(|| RemoteError::Io(io::Error::other("not found")))?;
            out.write_all(content)?;
            Ok(content.len() as u64)
        }
    }

    fn file(path: &str, size: u64) -> RemoteEntry {
        RemoteEntry::File {
            path: path.to_string(),
            size,
        }
    }

    fn folder(path: &str) -> RemoteEntry {
        RemoteEntry::Folder {
            path: path.to_string(),
        }
    }

    fn options(local_root: &Path, remote_folder: &str) -> MirrorOptions {
        MirrorOptions {
            local_root: local_root.to_path_buf(),
            remote_folder: normalize_remote_folder(remote_folder),
            dry_run: false,
            skip_existing_same_size: false,
        }
    }

    /// Helper: /photos with one file, a paginated subfolder, and a deleted entry.
    fn sample_store() -> FakeStore {
        FakeStore::default()
            .folder(
                "/photos",
                vec![vec![
                    file("/photos/a.jpg", 3),
                    folder("/photos/2020"),
                    RemoteEntry::Other {
                        path: "/photos/gone.jpg".to_string(),
                    },
                ]],
            )
            .folder(
                "/photos/2020",
                vec![vec![file("/photos/2020/b.jpg", 2)], vec![file("/photos/2020/c.jpg", 1)]],
            )
            .file("/photos/a.jpg", b"aaa")
            .file("/photos/2020/b.jpg", b"bb")
            .file("/photos/2020/c.jpg", b"c")
    }

    // --- Pure function tests ---

    #[test]
    fn test_normalize_remote_folder() {
        assert_eq!(normalize_remote_folder(""), "");
        assert_eq!(normalize_remote_folder("/"), "");
        assert_eq!(normalize_remote_folder("  Photos/2020/ "), "/Photos/2020");
        assert_eq!(normalize_remote_folder("/Photos//"), "/Photos");
    }

    #[test]
    fn test_local_path_strips_base_case_insensitively() {
        let local = local_path_for(Path::new("/backup"), "/photos/2020/img.jpg", "/Photos");
        assert_eq!(local, PathBuf::from("/backup/2020/img.jpg"));
    }

    #[test]
    fn test_local_path_root_base() {
        let local = local_path_for(Path::new("/backup"), "/Docs/A.txt", "");
        assert_eq!(local, PathBuf::from("/backup/docs/a.txt"));
    }

    #[test]
    fn test_local_path_base_is_component_wise() {
        let local = local_path_for(Path::new("/backup"), "/photos2/x.jpg", "/photos");
        assert_eq!(local, PathBuf::from("/backup/photos2/x.jpg"));
    }

    #[test]
    fn test_local_path_cannot_escape_root() {
        let local = local_path_for(Path::new("/backup"), "/../../etc/passwd", "");
        assert_eq!(local, PathBuf::from("/backup/etc/passwd"));
    }

    // --- Walk tests ---

    #[test]
    fn test_mirror_downloads_tree_across_pages() {
        let temp = TempDir::new().unwrap();
        let store = sample_store();
        let mut events = Vec::new();

        let totals = mirror(&store, &options(temp.path(), "/photos"), |e| events.push(e));

        assert_eq!(totals, MirrorTotals { files: 3, bytes: 6 });
        assert_eq!(fs::read(temp.path().join("a.jpg")).unwrap(), b"aaa");
        assert_eq!(fs::read(temp.path().join("2020/b.jpg")).unwrap(), b"bb");
        assert_eq!(fs::read(temp.path().join("2020/c.jpg")).unwrap(), b"c");
        assert!(events.contains(&MirrorEvent::MorePages {
            folder: "/photos/2020".to_string()
        }));
        assert!(events.contains(&MirrorEvent::Unsupported {
            path: "/photos/gone.jpg".to_string()
        }));
    }

    #[test]
    fn test_mirror_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let local_root = temp.path().join("backup");
        let store = sample_store();
        let mut opts = options(&local_root, "/photos");
        opts.dry_run = true;

        let totals = mirror(&store, &opts, |_| {});

        assert_eq!(totals, MirrorTotals { files: 3, bytes: 6 });
        assert!(!local_root.exists());
        assert!(store.downloads.borrow().is_empty());
    }

    #[test]
    fn test_mirror_skips_existing_same_size() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.jpg"), b"xyz").unwrap();
        let store = sample_store();
        let mut opts = options(temp.path(), "/photos");
        opts.skip_existing_same_size = true;

        let totals = mirror(&store, &opts, |_| {});

        assert_eq!(totals, MirrorTotals { files: 2, bytes: 3 });
        assert_eq!(fs::read(temp.path().join("a.jpg")).unwrap(), b"xyz");
        assert!(!store.downloads.borrow().contains(&"/photos/a.jpg".to_string()));
    }

    #[test]
    fn test_mirror_failed_download_leaves_no_partial_file() {
        let temp = TempDir::new().unwrap();
        let mut store = sample_store();
        store.broken_files.insert("/photos/a.jpg".to_string());

        let totals = mirror(&store, &options(temp.path(), "/photos"), |_| {});

        assert_eq!(totals, MirrorTotals { files: 2, bytes: 3 });
        assert!(!temp.path().join("a.jpg").exists());
    }

    #[test]
    fn test_mirror_listing_error_continues_with_siblings() {
        let temp = TempDir::new().unwrap();
        let mut store = sample_store();
        store.broken_folders.insert("/photos/2020".to_string());

        let totals = mirror(&store, &options(temp.path(), "/photos"), |_| {});

        assert_eq!(totals, MirrorTotals { files: 1, bytes: 3 });
    }

    #[test]
    fn test_mirror_root_folder() {
        let temp = TempDir::new().unwrap();
        let store = FakeStore::default()
            .folder("", vec![vec![file("/top.jpg", 1)]])
            .file("/top.jpg", b"t");

        let totals = mirror(&store, &options(temp.path(), "/"), |_| {});

        assert_eq!(totals.files, 1);
        assert!(temp.path().join("top.jpg").exists());
    }
}
