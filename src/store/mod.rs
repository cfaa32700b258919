//! Quiz result store
//!
//! One JSON file per result under a single directory of a versioned file
//! store. Anyone can read; writes and deletes need the session credential.
//!
//! ## Layout
//!
//! ```text
//! results/
//!   .gitkeep                                   placeholder, never deleted
//!   result-1704067200000-ada_example_com.json  one record
//!   result-1704067260000-bob_example_com.json
//! ```

pub mod credential;
pub mod error;
pub mod filename;
pub mod record;
pub mod result_store;

pub use credential::{Credential, Session, SessionError};
pub use error::{DeleteError, FailureKind, SaveError};
pub use filename::{is_result_file, result_filename, sanitize_email, RESULT_PREFIX, RESULT_SUFFIX};
pub use record::{sort_newest_first, QuizResult};
pub use result_store::{
    DeleteReport, FailedDelete, Listing, ResultStore, SavedResult, SkipReason, SkippedEntry,
};
