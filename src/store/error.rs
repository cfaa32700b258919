//! Store-level failures.
//!
//! Each failure maps to a `FailureKind`, because what the user has to do
//! next depends on it: sign in again, fix the repository settings, or just
//! retry.

use crate::backend::ApiError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No credential, or the backend rejected it
    Credential,
    /// The collection directory is missing and could not be created
    Directory,
    /// Network, backend or decoding problem
    Transport,
    /// The record lacks the fields the store needs
    InvalidRecord,
    /// Another save already took this record's filename
    Conflict,
}

impl FailureKind {
    /// Remediation text for an interactive caller
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::Credential => {
                "Not authorized to change results. Sign in again with a valid access token."
            }
            FailureKind::Directory => {
                "The results folder could not be created. Check the repository and branch settings."
            }
            FailureKind::Transport => {
                "Failed to reach the results storage. Please check your internet connection and retry."
            }
            FailureKind::InvalidRecord => {
                "This result is missing an email address or timestamp and was not saved."
            }
            FailureKind::Conflict => {
                "A result for this email was saved at the same moment. Please submit again."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    #[error("no write credential in session")]
    NotAuthorized,
    #[error("credential rejected: {0}")]
    CredentialRejected(ApiError),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// The write was still rejected after the directory was created
    #[error("directory {directory} still missing after remediation: {source}")]
    DirectoryMissing { directory: String, source: ApiError },
    /// Creating the directory placeholder failed
    #[error("could not create directory {directory}: {source}")]
    RemediationFailed { directory: String, source: ApiError },
    /// The target file already exists, so the write was refused
    #[error("{path} already exists: {source}")]
    FileExists { path: String, source: ApiError },
    #[error("save failed: {0}")]
    Transport(ApiError),
}

impl SaveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SaveError::NotAuthorized | SaveError::CredentialRejected(_) => FailureKind::Credential,
            SaveError::InvalidRecord(_) => FailureKind::InvalidRecord,
            SaveError::DirectoryMissing { .. } | SaveError::RemediationFailed { .. } => {
                FailureKind::Directory
            }
            SaveError::FileExists { .. } => FailureKind::Conflict,
            SaveError::Transport(_) => FailureKind::Transport,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteError {
    #[error("no write credential in session")]
    NotAuthorized,
    #[error("credential rejected: {0}")]
    CredentialRejected(ApiError),
    /// The directory could not be listed, so nothing was deleted
    #[error("listing failed: {0}")]
    Listing(ApiError),
}

impl DeleteError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DeleteError::NotAuthorized | DeleteError::CredentialRejected(_) => {
                FailureKind::Credential
            }
            DeleteError::Listing(_) => FailureKind::Transport,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}
