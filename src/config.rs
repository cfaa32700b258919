//! Configuration
//!
//! Loaded from a TOML file or from environment variables. The write token is
//! deliberately absent: it lives only in a `Session`.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | GITHUB_OWNER | - | Repository owner (required) |
//! | GITHUB_REPO | - | Repository name (required) |
//! | GITHUB_BRANCH | main | Branch the results are committed to |
//! | GITHUB_API_BASE | https://api.github.com | API root (GitHub Enterprise) |
//! | GITHUB_TIMEOUT_MS | 30000 | Per-request timeout |
//! | QUIZ_RESULTS_DIR | results | Directory holding the result files |
//! | QUIZ_KEEP_FILE | .gitkeep | Placeholder that materializes the directory |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_DIRECTORY: &str = "results";
pub const DEFAULT_KEEP_FILE: &str = ".gitkeep";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where and how result files are laid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory that holds one JSON file per result
    pub directory: String,
    /// Branch named in every write and delete request
    pub branch: String,
    /// Placeholder written to create the directory; never deleted
    pub keep_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            directory: DEFAULT_DIRECTORY.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            keep_file: DEFAULT_KEEP_FILE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Configuration for tests
    pub fn test() -> Self {
        StoreConfig {
            directory: "test-results".to_string(),
            ..Self::default()
        }
    }

    /// Directory path without surrounding slashes
    pub fn directory_path(&self) -> &str {
        self.directory.trim_matches('/')
    }

    /// Full path of a file inside the directory
    pub fn file_path(&self, name: &str) -> String {
        format!("{}/{}", self.directory_path(), name)
    }
}

/// GitHub repository and connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub user_agent: String,
    /// Per-request timeout; `None` waits indefinitely
    pub timeout_ms: Option<u64>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            owner: String::new(),
            repo: String::new(),
            branch: DEFAULT_BRANCH.to_string(),
            user_agent: format!("quiz-store/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: Some(30_000),
        }
    }
}

/// Complete configuration for the command-line front end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut github = GitHubConfig {
            owner: get("GITHUB_OWNER").ok_or(ConfigError::Missing("GITHUB_OWNER"))?,
            repo: get("GITHUB_REPO").ok_or(ConfigError::Missing("GITHUB_REPO"))?,
            ..GitHubConfig::default()
        };
        if let Some(branch) = get("GITHUB_BRANCH") {
            github.branch = branch;
        }
        if let Some(api_base) = get("GITHUB_API_BASE") {
            github.api_base = api_base;
        }
        if let Some(raw) = get("GITHUB_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "GITHUB_TIMEOUT_MS",
                value: raw.clone(),
            })?;
            github.timeout_ms = if ms == 0 { None } else { Some(ms) };
        }

        let mut store = StoreConfig::default();
        if let Some(directory) = get("QUIZ_RESULTS_DIR") {
            store.directory = directory;
        }
        if let Some(keep_file) = get("QUIZ_KEEP_FILE") {
            store.keep_file = keep_file;
        }

        Ok(AppConfig { github, store }.aligned())
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validated()
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.github.owner.trim().is_empty() {
            return Err(ConfigError::Missing("github.owner"));
        }
        if self.github.repo.trim().is_empty() {
            return Err(ConfigError::Missing("github.repo"));
        }
        Ok(self.aligned())
    }

    /// Writes go to the branch that is listed
    fn aligned(mut self) -> Self {
        self.store.branch = self.github.branch.clone();
        self
    }
}
