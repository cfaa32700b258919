pub mod backend;
pub mod clock;
pub mod config;
pub mod dst;
pub mod observability;
pub mod rng;
pub mod store;

pub use backend::{ApiError, ContentApi, ContentEntry, InMemoryContentApi};
#[cfg(feature = "github")]
pub use backend::GitHubContentsApi;
pub use config::{AppConfig, GitHubConfig, StoreConfig};
pub use store::{
    Credential, DeleteReport, QuizResult, ResultStore, SaveError, SavedResult, Session,
};
