//! Dropbox HTTP API v2 client implementing [`RemoteStore`].
//!
//! Blocking requests, bearer token supplied by the caller. No token
//! refresh, no retry.

use std::fmt::Write as _;
use std::io::Write;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::RemoteError;
use crate::mirror::{Account, ListPage, RemoteEntry, RemoteStore};

const API_URL: &str = "https://api.dropboxapi.com/2";
const CONTENT_URL: &str = "https://content.dropboxapi.com/2";

pub struct DropboxClient {
    http: Client,
    token: String,
}

impl DropboxClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
        }
    }

    fn rpc<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        args: &serde_json::Value,
    ) -> Result<T, RemoteError> {
        let response = self
            .http
            .post(format!("{}/{}", API_URL, endpoint))
            .bearer_auth(&self.token)
            .json(args)
            .send()?;
        Ok(check(endpoint, response)?.json()?)
    }
}

impl RemoteStore for DropboxClient {
    fn current_account(&self) -> Result<Account, RemoteError> {
        let account: WireAccount = self.rpc("users/get_current_account", &serde_json::Value::Null)?;
        Ok(Account {
            display_name: account.name.display_name,
            email: account.email,
        })
    }

    fn list_folder(&self, path: &str) -> Result<ListPage, RemoteError> {
        let result: WireListFolder =
            self.rpc("files/list_folder", &json!({ "path": path, "recursive": false }))?;
        Ok(result.into())
    }

    fn list_folder_continue(&self, cursor: &str) -> Result<ListPage, RemoteError> {
        let result: WireListFolder =
            self.rpc("files/list_folder/continue", &json!({ "cursor": cursor }))?;
        Ok(result.into())
    }

    fn download(&self, path: &str, out: &mut dyn Write) -> Result<u64, RemoteError> {
        let endpoint = "files/download";
        let arg = serde_json::to_string(&json!({ "path": path }))?;
        let response = self
            .http
            .post(format!("{}/{}", CONTENT_URL, endpoint))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", ascii_json(&arg))
            .send()?;
        let mut response = check(endpoint, response)?;
        Ok(std::io::copy(&mut response, out)?)
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireAccount {
    name: WireName,
    email: String,
}

#[derive(Debug, Deserialize)]
struct WireName {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct WireListFolder {
    entries: Vec<WireEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
enum WireEntry {
    File {
        path_lower: Option<String>,
        path_display: Option<String>,
        size: u64,
    },
    Folder {
        path_lower: Option<String>,
        path_display: Option<String>,
    },
    Deleted {
        path_lower: Option<String>,
        path_display: Option<String>,
    },
}

impl From<WireListFolder> for ListPage {
    fn from(wire: WireListFolder) -> Self {
        ListPage {
            entries: wire.entries.into_iter().map(RemoteEntry::from).collect(),
            cursor: wire.cursor,
            has_more: wire.has_more,
        }
    }
}

impl From<WireEntry> for RemoteEntry {
    fn from(wire: WireEntry) -> Self {
        match wire {
            WireEntry::File {
                path_lower,
                path_display,
                size,
            } => RemoteEntry::File {
                path: lower_path(path_lower, path_display),
                size,
            },
            WireEntry::Folder {
                path_lower,
                path_display,
            } => RemoteEntry::Folder {
                path: lower_path(path_lower, path_display),
            },
            WireEntry::Deleted {
                path_lower,
                path_display,
            } => RemoteEntry::Other {
                path: lower_path(path_lower, path_display),
            },
        }
    }
}

fn lower_path(path_lower: Option<String>, path_display: Option<String>) -> String {
    path_lower
        .or_else(|| path_display.map(|p| p.to_lowercase()))
        .unwrap_or_default()
}

/// Turn a non-2xx response into `RemoteError::Api`.
fn check(endpoint: &str, response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(RemoteError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: response.text().unwrap_or_default(),
    })
}

/// Escape non-ASCII characters as `\uXXXX` so JSON fits in an HTTP header.
fn ascii_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
