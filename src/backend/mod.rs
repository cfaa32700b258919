//! Content API Abstraction
//!
//! The remote side of the store: a version-controlled tree of files that
//! only offers directory listing, raw reads, create/update-via-commit and
//! delete-with-revision. Everything above this trait treats the backend as
//! a set of files and nothing more.
//!
//! Implementations:
//! - `InMemoryContentApi`: For unit tests and simulation
//! - `SimulatedContentApi`: Fault-injecting wrapper around another backend
//! - `GitHubContentsApi`: The GitHub REST contents endpoint (feature-gated)

pub mod memory;
pub mod simulated;
#[cfg(feature = "github")]
pub mod github;

pub use memory::{DirectoryPolicy, InMemoryContentApi, RequestCounts};
pub use simulated::{SimulatedApiConfig, SimulatedApiStats, SimulatedContentApi};
#[cfg(feature = "github")]
pub use github::GitHubContentsApi;

use crate::store::Credential;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by every backend call
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

pub type ApiResult<T> = Result<T, ApiError>;

/// Kind of a directory entry as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// File name without the directory
    pub name: String,
    /// Full path from the repository root
    pub path: String,
    /// Revision identifier; required to delete or overwrite the file
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Direct URL of the raw content (absent for directories)
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl ContentEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Body of a create/update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutFileRequest {
    /// Commit message
    pub message: String,
    /// File content, base64 encoded
    pub content: String,
    pub branch: String,
    /// Current revision; required only when overwriting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Body of a delete request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFileRequest {
    pub message: String,
    pub sha: String,
    pub branch: String,
}

/// Error type for backend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Path (file or directory) does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Missing, invalid or insufficient credential
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    /// Revision identifier does not match the current file
    #[error("revision conflict: {0}")]
    Conflict(String),
    /// Request understood but rejected by the backend
    #[error("unprocessable entity: {0}")]
    Unprocessable(String),
    /// Any other non-success status
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    /// The request never produced a response
    #[error("transport failure: {0}")]
    Transport(String),
    /// The response could not be decoded
    #[error("decode failure: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success HTTP status and its body to an error
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        match status {
            401 | 403 => ApiError::Unauthorized { status, message },
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            422 => ApiError::Unprocessable(message),
            _ => ApiError::Status { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Write rejections that mean the parent directory has not been
    /// materialized yet.
    pub fn is_directory_missing(&self) -> bool {
        matches!(self, ApiError::NotFound(_) | ApiError::Unprocessable(_))
    }
}

/// Pull `message` out of a JSON error body, falling back to the raw text
fn extract_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.trim().to_string(),
    }
}

/// Content API abstraction trait
///
/// Reads take an optional credential and may be attempted anonymously.
/// Writes and deletes always carry one.
pub trait ContentApi: Send + Sync + 'static {
    /// List the direct children of a directory
    fn list_dir<'a>(
        &'a self,
        path: &'a str,
        credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<ContentEntry>>;

    /// Fetch the raw bytes of a listed file
    fn fetch_raw<'a>(
        &'a self,
        entry: &'a ContentEntry,
        credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<u8>>;

    /// Create (or, with `sha`, update) a file
    fn put_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a PutFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ContentEntry>;

    /// Delete a file at a known revision
    fn delete_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a DeleteFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ()>;
}
