//! In-memory content API
//!
//! Behaves like the hosted contents endpoint closely enough for the store
//! to be tested end to end: directories are implied by the files in them,
//! every file carries a git blob hash as its revision, and writes and
//! deletes are checked against that revision.

use crate::backend::{
    ApiError, ApiFuture, ContentApi, ContentEntry, DeleteFileRequest, EntryKind, PutFileRequest,
};
use crate::store::Credential;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::RwLock;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How writes into a directory that does not exist are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryPolicy {
    /// Parent directories are created implicitly (hosted behaviour)
    #[default]
    AutoCreate,
    /// Writes into a missing directory fail with `NotFound`, except for
    /// dot-file placeholders, which materialize it
    Explicit,
}

/// Number of requests served, per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub lists: u64,
    pub fetches: u64,
    pub puts: u64,
    pub deletes: u64,
}

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    sha: String,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    counts: RequestCounts,
}

/// In-memory backend; clones share the same tree
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentApi {
    state: Arc<RwLock<State>>,
    policy: DirectoryPolicy,
    accepted_token: Option<String>,
}

/// Git blob hash of some content
pub fn blob_sha(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", data.len()).as_bytes());
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn file_entry(path: &str, file: &StoredFile) -> ContentEntry {
    let (_, name) = split_path(path);
    ContentEntry {
        name: name.to_string(),
        path: path.to_string(),
        sha: file.sha.clone(),
        kind: EntryKind::File,
        download_url: Some(format!("memory://{}", path)),
        size: file.data.len() as u64,
    }
}

impl State {
    fn dir_exists(&self, dir: &str) -> bool {
        if dir.is_empty() {
            return true;
        }
        let prefix = format!("{}/", dir);
        self.files.keys().any(|k| k.starts_with(&prefix))
    }
}

impl InMemoryContentApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: DirectoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reject writes and deletes whose credential differs from `token`
    pub fn with_accepted_token(mut self, token: impl Into<String>) -> Self {
        self.accepted_token = Some(token.into());
        self
    }

    /// Place raw bytes at `path` without going through the API
    pub fn insert_raw(&self, path: &str, data: &[u8]) {
        let file = StoredFile {
            data: data.to_vec(),
            sha: blob_sha(data),
        };
        self.state
            .write()
            .files
            .insert(normalize(path).to_string(), file);
    }

    /// Current raw content of a file
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .files
            .get(normalize(path))
            .map(|f| f.data.clone())
    }

    /// All file paths, sorted
    pub fn paths(&self) -> Vec<String> {
        self.state.read().files.keys().cloned().collect()
    }

    pub fn file_count(&self) -> usize {
        self.state.read().files.len()
    }

    pub fn request_counts(&self) -> RequestCounts {
        self.state.read().counts
    }

    pub fn reset_counts(&self) {
        self.state.write().counts = RequestCounts::default();
    }

    fn authorize(&self, credential: &Credential) -> Result<(), ApiError> {
        match &self.accepted_token {
            Some(token) if token != credential.expose() => Err(ApiError::Unauthorized {
                status: 401,
                message: "Bad credentials".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl ContentApi for InMemoryContentApi {
    fn list_dir<'a>(
        &'a self,
        path: &'a str,
        _credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<ContentEntry>> {
        Box::pin(async move {
            let dir = normalize(path);
            let mut state = self.state.write();
            state.counts.lists += 1;

            if !state.dir_exists(dir) {
                return Err(ApiError::NotFound(dir.to_string()));
            }

            let prefix = if dir.is_empty() {
                String::new()
            } else {
                format!("{}/", dir)
            };

            let mut entries = Vec::new();
            let mut last_subdir: Option<String> = None;
            for (key, file) in state.files.range(prefix.clone()..) {
                let Some(rest) = key.strip_prefix(&prefix) else {
                    break;
                };
                match rest.split_once('/') {
                    None => entries.push(file_entry(key, file)),
                    Some((subdir, _)) => {
                        if last_subdir.as_deref() == Some(subdir) {
                            continue;
                        }
                        let sub_path = format!("{}{}", prefix, subdir);
                        entries.push(ContentEntry {
                            name: subdir.to_string(),
                            sha: blob_sha(sub_path.as_bytes()),
                            path: sub_path,
                            kind: EntryKind::Dir,
                            download_url: None,
                            size: 0,
                        });
                        last_subdir = Some(subdir.to_string());
                    }
                }
            }

            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        })
    }

    fn fetch_raw<'a>(
        &'a self,
        entry: &'a ContentEntry,
        _credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let mut state = self.state.write();
            state.counts.fetches += 1;
            state
                .files
                .get(normalize(&entry.path))
                .map(|f| f.data.clone())
                .ok_or_else(|| ApiError::NotFound(entry.path.clone()))
        })
    }

    fn put_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a PutFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ContentEntry> {
        Box::pin(async move {
            let path = normalize(path);
            let mut state = self.state.write();
            state.counts.puts += 1;
            self.authorize(credential)?;

            let compact: String = request
                .content
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let data = BASE64
                .decode(compact.as_bytes())
                .map_err(|e| ApiError::Unprocessable(format!("content is not valid Base64: {}", e)))?;

            if let Some(existing) = state.files.get(path) {
                match &request.sha {
                    None => {
                        return Err(ApiError::Unprocessable(
                            "\"sha\" wasn't supplied.".to_string(),
                        ))
                    }
                    Some(sha) if *sha != existing.sha => {
                        return Err(ApiError::Conflict(format!(
                            "{} does not match {}",
                            path, sha
                        )))
                    }
                    Some(_) => {}
                }
            } else {
                let (parent, name) = split_path(path);
                if self.policy == DirectoryPolicy::Explicit
                    && !state.dir_exists(parent)
                    && !name.starts_with('.')
                {
                    return Err(ApiError::NotFound(parent.to_string()));
                }
            }

            let file = StoredFile {
                sha: blob_sha(&data),
                data,
            };
            let entry = file_entry(path, &file);
            state.files.insert(path.to_string(), file);
            Ok(entry)
        })
    }

    fn delete_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a DeleteFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let path = normalize(path);
            let mut state = self.state.write();
            state.counts.deletes += 1;
            self.authorize(credential)?;

            let current = state
                .files
                .get(path)
                .ok_or_else(|| ApiError::NotFound(path.to_string()))?;
            if current.sha != request.sha {
                return Err(ApiError::Conflict(format!(
                    "{} does not match {}",
                    path, request.sha
                )));
            }
            state.files.remove(path);
            Ok(())
        })
    }
}
