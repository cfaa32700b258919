//! Logging Configuration
//!
//! All settings are loaded from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | QUIZ_LOG | info | `EnvFilter` directive, e.g. `quiz_store=debug` |
//! | QUIZ_LOG_FORMAT | text | `text` or `json` |

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Unknown values fall back to text
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info".to_string(),
            format: LogFormat::Text,
            with_target: false,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LogConfig::default();
        LogConfig {
            filter: lookup("QUIZ_LOG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.filter),
            format: lookup("QUIZ_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            with_target: lookup("QUIZ_LOG_TARGET")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.with_target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.filter, "info");
    }

    #[test]
    fn test_overrides() {
        let config = LogConfig::from_lookup(|key| match key {
            "QUIZ_LOG" => Some("quiz_store=debug".to_string()),
            "QUIZ_LOG_FORMAT" => Some("JSON".to_string()),
            "QUIZ_LOG_TARGET" => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(config.filter, "quiz_store=debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.with_target);
    }

    #[test]
    fn test_unknown_format_is_text() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
        assert_eq!(LogFormat::parse(" json "), LogFormat::Json);
    }
}
