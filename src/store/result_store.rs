//! ResultStore: document-store operations over a tree of files.
//!
//! ## Mapping
//!
//! ```text
//! list_all        → GET dir, then GET each *.json, sort newest first
//! save            → PUT dir/result-<ms>-<email>.json
//!                   (on directory-missing: PUT dir/.gitkeep, PUT again, once;
//!                    a second refusal lists dir to tell a taken name apart)
//! exists_by_email → list_all + case-insensitive scan
//! delete_all      → GET dir, then DELETE each file with its revision
//! ```
//!
//! Reads degrade to an empty collection and log; writes report a typed
//! failure. Nothing here is transactional: `delete_all` issues one delete
//! per file and reports the ones that failed.

use crate::backend::{ApiError, ContentApi, ContentEntry, DeleteFileRequest, PutFileRequest};
use crate::clock::{ProductionClock, StoreClock};
use crate::config::StoreConfig;
use crate::store::error::{DeleteError, SaveError};
use crate::store::filename::{is_result_file, result_filename};
use crate::store::record::{sort_newest_first, QuizResult};
use crate::store::{Credential, Session};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, error, info, warn};

/// A record file that was listed but could not be read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Content could not be fetched (often a listing ahead of the content)
    Fetch(ApiError),
    /// Content is not a valid record
    Parse(String),
}

/// Result of a strict read of the collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    /// Records, newest first
    pub results: Vec<QuizResult>,
    pub skipped: Vec<SkippedEntry>,
}

/// A confirmed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedResult {
    pub filename: String,
    pub path: String,
    /// Revision identifier of the new file
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelete {
    pub name: String,
    pub error: ApiError,
}

/// Outcome of a batch delete whose listing succeeded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDelete>,
    /// Placeholder and non-file entries left in place
    pub retained: Vec<String>,
}

impl DeleteReport {
    /// Every deletable file was deleted
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Document-store facade over a `ContentApi`
pub struct ResultStore<A: ContentApi, C: StoreClock = ProductionClock> {
    api: A,
    clock: C,
    config: StoreConfig,
}

impl<A: ContentApi> ResultStore<A, ProductionClock> {
    pub fn new(api: A, config: StoreConfig) -> Self {
        ResultStore {
            api,
            clock: ProductionClock,
            config,
        }
    }
}

impl<A: ContentApi, C: StoreClock> ResultStore<A, C> {
    pub fn with_clock(api: A, clock: C, config: StoreConfig) -> Self {
        ResultStore { api, clock, config }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Read every record, newest first
    ///
    /// An absent directory is an empty collection. Entries that cannot be
    /// fetched or parsed are skipped and reported; only a failed listing is
    /// an error.
    pub async fn load_all(&self, session: &Session) -> Result<Listing, ApiError> {
        let directory = self.config.directory_path();
        let credential = session.credential();

        let entries = match self.api.list_dir(directory, credential).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                debug!(directory, "collection does not exist yet");
                return Ok(Listing::default());
            }
            Err(e) => return Err(e),
        };

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        for entry in entries
            .iter()
            .filter(|e| e.is_file() && is_result_file(&e.name))
        {
            match self.read_entry(entry, credential).await {
                Ok(record) => results.push(record),
                Err(reason) => {
                    warn!(file = %entry.name, ?reason, "skipping unreadable result");
                    skipped.push(SkippedEntry {
                        name: entry.name.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(Listing {
            results: sort_newest_first(results),
            skipped,
        })
    }

    /// Read every record, newest first, never failing
    ///
    /// Any listing failure is logged and yields an empty sequence.
    pub async fn list_all(&self, session: &Session) -> Vec<QuizResult> {
        match self.load_all(session).await {
            Ok(listing) => listing.results,
            Err(e) => {
                error!(directory = self.config.directory_path(), error = %e, "failed to load results");
                Vec::new()
            }
        }
    }

    async fn read_entry(
        &self,
        entry: &ContentEntry,
        credential: Option<&Credential>,
    ) -> Result<QuizResult, SkipReason> {
        let data = self
            .api
            .fetch_raw(entry, credential)
            .await
            .map_err(SkipReason::Fetch)?;
        QuizResult::from_json_slice(&data).map_err(|e| SkipReason::Parse(e.to_string()))
    }

    /// Write one record as a new file
    ///
    /// Requires a credential. If the backend reports the directory missing,
    /// the placeholder is written and the same file is attempted once more.
    pub async fn save(&self, session: &Session, record: &QuizResult) -> Result<SavedResult, SaveError> {
        let result = self.try_save(session, record).await;
        match &result {
            Ok(saved) => info!(file = %saved.filename, "saved quiz result"),
            Err(e) => warn!(
                error = %e,
                kind = ?e.kind(),
                message = e.user_message(),
                "failed to save quiz result"
            ),
        }
        result
    }

    async fn try_save(&self, session: &Session, record: &QuizResult) -> Result<SavedResult, SaveError> {
        let credential = session.credential().ok_or(SaveError::NotAuthorized)?;
        record.validate().map_err(SaveError::InvalidRecord)?;

        let filename = result_filename(self.clock.now(), &record.email);
        let path = self.config.file_path(&filename);
        let json = record
            .to_pretty_json()
            .map_err(|e| SaveError::InvalidRecord(e.to_string()))?;
        let request = PutFileRequest {
            message: format!("Add quiz result for {}", record.display_name()),
            content: BASE64.encode(json.as_bytes()),
            branch: self.config.branch.clone(),
            sha: None,
        };

        let mut remediated = false;
        loop {
            match self.api.put_file(&path, &request, credential).await {
                Ok(entry) => {
                    return Ok(SavedResult {
                        filename,
                        path,
                        sha: entry.sha,
                    })
                }
                Err(e) if e.is_unauthorized() => return Err(SaveError::CredentialRejected(e)),
                Err(e) if e.is_directory_missing() => {
                    if remediated {
                        if self.file_listed(&filename, credential).await {
                            return Err(SaveError::FileExists { path, source: e });
                        }
                        return Err(SaveError::DirectoryMissing {
                            directory: self.config.directory_path().to_string(),
                            source: e,
                        });
                    }
                    info!(directory = self.config.directory_path(), error = %e, "creating results directory");
                    self.materialize_directory(credential).await?;
                    remediated = true;
                }
                Err(e) => return Err(SaveError::Transport(e)),
            }
        }
    }

    /// Whether the directory listing shows `filename`
    ///
    /// Once the placeholder is in place, a refused write with the file
    /// listed means the name was taken by another save in the same
    /// millisecond rather than a missing directory.
    async fn file_listed(&self, filename: &str, credential: &Credential) -> bool {
        match self
            .api
            .list_dir(self.config.directory_path(), Some(credential))
            .await
        {
            Ok(entries) => entries.iter().any(|e| e.is_file() && e.name == filename),
            Err(e) => {
                debug!(error = %e, "could not list directory after refused write");
                false
            }
        }
    }

    /// Write the placeholder that makes the directory exist
    async fn materialize_directory(&self, credential: &Credential) -> Result<(), SaveError> {
        let directory = self.config.directory_path();
        let path = self.config.file_path(&self.config.keep_file);
        let request = PutFileRequest {
            message: format!("Create {} directory", directory),
            content: String::new(),
            branch: self.config.branch.clone(),
            sha: None,
        };

        match self.api.put_file(&path, &request, credential).await {
            Ok(_) => Ok(()),
            // Writing over an existing file without its revision is rejected
            Err(ApiError::Unprocessable(msg)) => {
                debug!(%path, %msg, "placeholder already present");
                Ok(())
            }
            Err(e) if e.is_unauthorized() => Err(SaveError::CredentialRejected(e)),
            Err(e) => Err(SaveError::RemediationFailed {
                directory: directory.to_string(),
                source: e,
            }),
        }
    }

    /// Whether any stored record has this email, ignoring case
    ///
    /// Rescans the whole collection on every call.
    pub async fn exists_by_email(&self, session: &Session, email: &str) -> bool {
        self.list_all(session)
            .await
            .iter()
            .any(|r| r.email_matches(email))
    }

    /// Delete every record file
    ///
    /// Deletes run one at a time and independently. `Ok` means the listing
    /// succeeded; individual failures are in `DeleteReport::failed`.
    pub async fn delete_all(&self, session: &Session) -> Result<DeleteReport, DeleteError> {
        let Some(credential) = session.credential() else {
            warn!("delete_all called without credential");
            return Err(DeleteError::NotAuthorized);
        };
        let directory = self.config.directory_path();

        let entries = match self.api.list_dir(directory, Some(credential)).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                info!(directory, "nothing to delete");
                return Ok(DeleteReport::default());
            }
            Err(e) if e.is_unauthorized() => return Err(DeleteError::CredentialRejected(e)),
            Err(e) => {
                error!(directory, error = %e, "failed to list results for deletion");
                return Err(DeleteError::Listing(e));
            }
        };

        let mut report = DeleteReport::default();
        for entry in entries {
            if !entry.is_file() || entry.name == self.config.keep_file {
                report.retained.push(entry.name);
                continue;
            }

            let request = DeleteFileRequest {
                message: format!("Delete {}", entry.name),
                sha: entry.sha.clone(),
                branch: self.config.branch.clone(),
            };
            match self.api.delete_file(&entry.path, &request, credential).await {
                Ok(()) => {
                    debug!(file = %entry.name, "deleted");
                    report.deleted.push(entry.name);
                }
                Err(error) => {
                    warn!(file = %entry.name, %error, "failed to delete result");
                    report.failed.push(FailedDelete {
                        name: entry.name,
                        error,
                    });
                }
            }
        }

        if report.is_complete() {
            info!(deleted = report.deleted.len(), "deleted all results");
        } else {
            warn!(
                deleted = report.deleted.len(),
                failed = report.failed_count(),
                "partial delete; collection left in a mixed state"
            );
        }
        Ok(report)
    }
}
