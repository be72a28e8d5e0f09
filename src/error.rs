//! Error types.
//!
//! Per-file failures (decode, move, copy) are values the caller records and
//! moves past. Configuration errors stop a command before it touches disk.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A file matched the allow-list but could not be turned into a hash.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[cfg(feature = "heif")]
    #[error("cannot decode {path}: {source}")]
    Heif {
        path: PathBuf,
        source: libheif_rs::HeifError,
    },

    #[cfg(feature = "heif")]
    #[error("cannot decode {path}: unsupported pixel layout")]
    Layout { path: PathBuf },
}

/// Invalid invocation, detected before any processing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot use both --move and --delete at the same time")]
    MoveAndDelete,

    #[error("'{0}' is not a valid directory")]
    NotADirectory(PathBuf),

    #[error("no access token provided; pass --access-token or set DROPBOX_ACCESS_TOKEN")]
    MissingToken,
}

/// A filesystem operation failed on a specific path.
#[derive(Debug, Error)]
#[error("{op} {path}: {source}")]
pub struct OperationError {
    pub op: &'static str,
    pub path: PathBuf,
    pub source: io::Error,
}

impl OperationError {
    pub fn new(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Failure talking to the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}) on {endpoint}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("invalid API argument: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure reading image metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("could not parse metadata: {0}")]
    Exif(#[from] exif::Error),
}
