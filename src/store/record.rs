//! Quiz result record.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// One persisted quiz result
///
/// `email` and `timestamp` are required. Every other member, `name` and
/// `score` included, lives untyped in `extra`, so a record reads back
/// exactly as it was written whatever those members hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub email: String,
    /// ISO-8601 creation time, used for ordering
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuizResult {
    pub fn new(email: impl Into<String>, timestamp: impl Into<String>) -> Self {
        QuizResult {
            email: email.into(),
            timestamp: timestamp.into(),
            extra: Map::new(),
        }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_field("name", name.into())
    }

    pub fn with_score(self, score: impl Into<Value>) -> Self {
        self.with_field("score", score)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// `name` when it is a string
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    /// `score` as stored, whatever its JSON type
    pub fn score(&self) -> Option<&Value> {
        self.extra.get("score")
    }

    /// Name used in commit messages
    pub fn display_name(&self) -> &str {
        match self.name() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }

    /// Checks the fields the store relies on
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("email is empty".to_string());
        }
        if self.timestamp.trim().is_empty() {
            return Err("timestamp is empty".to_string());
        }
        Ok(())
    }

    /// Case-insensitive email comparison
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.to_lowercase() == email.to_lowercase()
    }

    /// RFC 3339 timestamp, or a bare `YYYY-MM-DD` date at midnight UTC
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.timestamp.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset())
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_slice(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Newest first. Unparseable timestamps go last; ties keep their order.
pub fn sort_newest_first(results: Vec<QuizResult>) -> Vec<QuizResult> {
    let mut keyed: Vec<(Option<DateTime<FixedOffset>>, QuizResult)> = results
        .into_iter()
        .map(|r| (r.parsed_timestamp(), r))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed.into_iter().map(|(_, r)| r).collect()
}
