//! Quiz results command-line front end
//!
//! ## Usage
//!
//! ```text
//! quiz-results list [--json]
//! quiz-results exists <email>
//! quiz-results save <file.json | ->
//! quiz-results clear
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | QUIZ_CONFIG | - | TOML config file; otherwise the GITHUB_* variables are used |
//! | GITHUB_TOKEN | - | Write credential for `save` and `clear` |
//! | QUIZ_LOG | info | Log filter |
//! | QUIZ_LOG_FORMAT | text | `text` or `json` |
//!
//! `exists` exits 0 when a result is found and 1 otherwise. `clear` exits
//! non-zero when any file could not be deleted.

use chrono::{SecondsFormat, Utc};
use quiz_store::observability::{init_tracing, LogConfig};
use quiz_store::{AppConfig, GitHubContentsApi, QuizResult, ResultStore, Session};
use std::io::Read;
use std::process::ExitCode;
use tracing::{debug, info};

fn usage() -> ExitCode {
    eprintln!("Usage: quiz-results <list [--json] | exists <email> | save <file|-> | clear>");
    ExitCode::from(2)
}

fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match std::env::var("QUIZ_CONFIG") {
        Ok(path) if !path.trim().is_empty() => AppConfig::from_file(path.trim())?,
        _ => AppConfig::from_env()?,
    };
    Ok(config)
}

fn session_from_env() -> Session {
    let mut session = Session::anonymous();
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        if session.authenticate(token).is_ok() {
            debug!("write credential loaded");
        }
    }
    session
}

/// Parse a record, stamping the current time if it has none
fn parse_record(text: &str) -> Result<QuizResult, Box<dyn std::error::Error>> {
    let mut value: serde_json::Value = serde_json::from_str(text)?;
    if let Some(object) = value.as_object_mut() {
        object.entry("timestamp").or_insert_with(|| {
            serde_json::Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        });
    }
    Ok(serde_json::from_value(value)?)
}

fn read_input(source: &str) -> std::io::Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(source)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing(&LogConfig::from_env());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        return Ok(usage());
    };

    let config = load_config()?;
    info!(
        owner = %config.github.owner,
        repo = %config.github.repo,
        branch = %config.github.branch,
        directory = %config.store.directory,
        "using results repository"
    );
    let api = GitHubContentsApi::new(config.github.clone())?;
    let store = ResultStore::new(api, config.store.clone());
    let session = session_from_env();

    match (command, args.get(1).map(String::as_str)) {
        ("list", flag) => {
            let results = store.list_all(&session).await;
            if flag == Some("--json") {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for r in &results {
                    let score = match r.score() {
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(serde_json::Value::Null) | None => String::new(),
                        Some(other) => other.to_string(),
                    };
                    println!("{}\t{}\t{}\t{}", r.timestamp, r.display_name(), r.email, score);
                }
                eprintln!("{} result(s)", results.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        ("exists", Some(email)) => {
            let found = store.exists_by_email(&session, email).await;
            println!("{}", found);
            Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        ("save", Some(source)) => {
            let record = parse_record(&read_input(source)?)?;
            match store.save(&session, &record).await {
                Ok(saved) => {
                    println!("{}", saved.path);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    eprintln!("({})", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        ("clear", None) => match store.delete_all(&session).await {
            Ok(report) => {
                for name in &report.deleted {
                    println!("deleted {}", name);
                }
                for failed in &report.failed {
                    eprintln!("failed {}: {}", failed.name, failed.error);
                }
                if report.is_complete() {
                    Ok(ExitCode::SUCCESS)
                } else {
                    eprintln!(
                        "{} of {} deletes failed; run clear again",
                        report.failed_count(),
                        report.failed_count() + report.deleted.len()
                    );
                    Ok(ExitCode::FAILURE)
                }
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                eprintln!("({})", e);
                Ok(ExitCode::FAILURE)
            }
        },
        _ => Ok(usage()),
    }
}
