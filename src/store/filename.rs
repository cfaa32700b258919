//! Result filenames.
//!
//! `result-<creation millis>-<sanitized email>.json`. The timestamp keeps
//! repeated submissions for one email apart and makes names sort by
//! creation time; the email keeps simultaneous submissions apart.

use crate::clock::EpochMillis;

pub const RESULT_PREFIX: &str = "result-";
pub const RESULT_SUFFIX: &str = ".json";

/// Replace every character outside `[A-Za-z0-9]` with `_`
pub fn sanitize_email(email: &str) -> String {
    email
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn result_filename(created: EpochMillis, email: &str) -> String {
    format!(
        "{}{}-{}{}",
        RESULT_PREFIX,
        created.as_millis(),
        sanitize_email(email),
        RESULT_SUFFIX
    )
}

/// Whether a directory entry holds a record
pub fn is_result_file(name: &str) -> bool {
    name.ends_with(RESULT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_email() {
        assert_eq!(sanitize_email("ada.lovelace+quiz@example.com"), "ada_lovelace_quiz_example_com");
        assert_eq!(sanitize_email("ABC123"), "ABC123");
        assert_eq!(sanitize_email("é@x"), "__x");
    }

    #[test]
    fn test_result_filename_format() {
        let name = result_filename(EpochMillis(1_704_067_200_000), "a@x.com");
        assert_eq!(name, "result-1704067200000-a_x_com.json");
        assert!(is_result_file(&name));
    }

    #[test]
    fn test_same_email_different_millis_differ() {
        let a = result_filename(EpochMillis(1000), "a@x.com");
        let b = result_filename(EpochMillis(1001), "a@x.com");
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_millis_different_emails_differ() {
        let a = result_filename(EpochMillis(1000), "a@x.com");
        let b = result_filename(EpochMillis(1000), "b@x.com");
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_result_file() {
        assert!(is_result_file("result-1-a.json"));
        assert!(is_result_file("legacy.json"));
        assert!(!is_result_file(".gitkeep"));
        assert!(!is_result_file("notes.json.bak"));
    }
}
