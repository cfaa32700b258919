//! ResultStore behaviour over the in-memory backend
//!
//! Exercises the public API the way a caller would: explicit sessions,
//! a simulated clock for filenames, and the backend inspected directly.

use quiz_store::backend::{ContentApi, DirectoryPolicy, InMemoryContentApi, PutFileRequest};
use quiz_store::clock::SimulatedClock;
use quiz_store::store::{
    Credential, DeleteError, FailureKind, QuizResult, ResultStore, SaveError, Session,
};
use quiz_store::StoreConfig;
use serde_json::json;

const T0: u64 = 1_704_067_200_000;

fn setup(policy: DirectoryPolicy) -> (
    ResultStore<InMemoryContentApi, SimulatedClock>,
    InMemoryContentApi,
    SimulatedClock,
) {
    let api = InMemoryContentApi::new().with_policy(policy);
    let clock = SimulatedClock::new(T0);
    let store = ResultStore::with_clock(api.clone(), clock.clone(), StoreConfig::default());
    (store, api, clock)
}

fn session() -> Session {
    let mut session = Session::anonymous();
    session.authenticate("ghp_test").unwrap();
    session
}

#[tokio::test]
async fn test_two_saves_list_newest_first() {
    let (store, _, clock) = setup(DirectoryPolicy::AutoCreate);
    let s = session();
    let a = QuizResult::new("a@x.com", "2024-01-01T00:00:00Z");
    let b = QuizResult::new("b@x.com", "2024-01-02T00:00:00Z");

    store.save(&s, &a).await.unwrap();
    clock.advance_ms(1);
    store.save(&s, &b).await.unwrap();

    assert_eq!(store.list_all(&s).await, vec![b, a]);
}

#[tokio::test]
async fn test_saved_record_round_trips_field_for_field() {
    let (store, _, _) = setup(DirectoryPolicy::AutoCreate);
    let record = QuizResult::new("Ada@Example.com", "2024-05-06T07:08:09.123Z")
        .with_name("Ada Lovelace")
        .with_score(17)
        .with_field("percentage", 85.5)
        .with_field("passed", true)
        .with_field("timeTaken", "12:03")
        .with_field("answers", json!({"q1": "b", "q2": null}));

    store.save(&session(), &record).await.unwrap();

    let listed = store.list_all(&Session::anonymous()).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], record);
}

#[tokio::test]
async fn test_three_timestamps_listed_in_reverse_order() {
    let (store, _, clock) = setup(DirectoryPolicy::AutoCreate);
    let s = session();
    let t1 = QuizResult::new("x@x.com", "2024-03-01");
    let t2 = QuizResult::new("x@x.com", "2024-03-01T12:00:00Z");
    let t3 = QuizResult::new("x@x.com", "2024-03-02T00:00:00+05:00");

    for record in [&t2, &t3, &t1] {
        store.save(&s, record).await.unwrap();
        clock.advance_ms(10);
    }

    assert_eq!(store.list_all(&s).await, vec![t3, t2, t1]);
}

#[tokio::test]
async fn test_filenames_are_distinct() {
    let (store, api, clock) = setup(DirectoryPolicy::AutoCreate);
    let s = session();

    let first = store.save(&s, &QuizResult::new("a@x.com", "2024-01-01")).await.unwrap();
    let same_instant = store.save(&s, &QuizResult::new("b@x.com", "2024-01-01")).await.unwrap();
    clock.advance_ms(1);
    let same_email = store.save(&s, &QuizResult::new("a@x.com", "2024-01-01")).await.unwrap();

    assert_ne!(first.filename, same_instant.filename);
    assert_ne!(first.filename, same_email.filename);
    assert_eq!(api.file_count(), 3);
}

#[tokio::test]
async fn test_fresh_collection() {
    let (store, api, _) = setup(DirectoryPolicy::Explicit);
    let s = session();

    assert!(store.list_all(&s).await.is_empty());
    assert!(!store.exists_by_email(&s, "a@x.com").await);
    let report = store.delete_all(&s).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(api.file_count(), 0);
}

#[tokio::test]
async fn test_anonymous_session_can_read_but_not_write() {
    let (store, api, _) = setup(DirectoryPolicy::AutoCreate);
    store
        .save(&session(), &QuizResult::new("a@x.com", "2024-01-01"))
        .await
        .unwrap();
    api.reset_counts();

    let anonymous = Session::anonymous();
    assert_eq!(store.list_all(&anonymous).await.len(), 1);
    assert!(store.exists_by_email(&anonymous, "A@X.COM").await);

    let err = store
        .save(&anonymous, &QuizResult::new("b@x.com", "2024-01-02"))
        .await
        .unwrap_err();
    assert_eq!(err, SaveError::NotAuthorized);
    assert_eq!(
        err.user_message(),
        FailureKind::Credential.user_message()
    );
    assert_eq!(
        store.delete_all(&anonymous).await.unwrap_err(),
        DeleteError::NotAuthorized
    );

    let counts = api.request_counts();
    assert_eq!((counts.puts, counts.deletes), (0, 0));
    assert_eq!(api.file_count(), 1);
}

#[tokio::test]
async fn test_first_save_materializes_directory() {
    let (store, api, _) = setup(DirectoryPolicy::Explicit);

    let saved = store
        .save(&session(), &QuizResult::new("a@x.com", "2024-01-01"))
        .await
        .unwrap();

    assert_eq!(
        api.paths(),
        vec!["results/.gitkeep".to_string(), saved.path]
    );
    assert_eq!(api.read("results/.gitkeep"), Some(Vec::new()));
    assert_eq!(api.request_counts().puts, 3);
}

#[tokio::test]
async fn test_exists_is_false_after_delete_all() {
    let (store, api, clock) = setup(DirectoryPolicy::Explicit);
    let s = session();
    for email in ["a@x.com", "b@x.com"] {
        store.save(&s, &QuizResult::new(email, "2024-01-01")).await.unwrap();
        clock.advance_ms(1);
    }
    assert!(store.exists_by_email(&s, "b@x.com").await);

    let report = store.delete_all(&s).await.unwrap();
    assert_eq!(report.deleted.len(), 2);
    assert_eq!(report.retained, vec![".gitkeep".to_string()]);

    assert!(!store.exists_by_email(&s, "a@x.com").await);
    assert!(!store.exists_by_email(&s, "b@x.com").await);
    assert_eq!(api.paths(), vec!["results/.gitkeep".to_string()]);

    // The directory survives, so the next save needs no remediation
    api.reset_counts();
    store.save(&s, &QuizResult::new("c@x.com", "2024-01-03")).await.unwrap();
    assert_eq!(api.request_counts().puts, 1);
}

#[tokio::test]
async fn test_rejected_token() {
    let api = InMemoryContentApi::new().with_accepted_token("the-real-token");
    let store = ResultStore::with_clock(api.clone(), SimulatedClock::new(T0), StoreConfig::default());

    let err = store
        .save(&session(), &QuizResult::new("a@x.com", "2024-01-01"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Credential);

    let good = Session::authenticated(Credential::new("the-real-token").unwrap());
    store.save(&good, &QuizResult::new("a@x.com", "2024-01-01")).await.unwrap();

    let report = store.delete_all(&session()).await.unwrap();
    assert_eq!(report.failed_count(), 1, "each delete is rejected individually");
    assert_eq!(api.file_count(), 1);
}

#[tokio::test]
async fn test_foreign_files_are_ignored_on_read() {
    let (store, api, _) = setup(DirectoryPolicy::AutoCreate);
    api.insert_raw("results/README.md", b"# results");
    api.insert_raw("results/broken.json", b"[1, 2");
    api.insert_raw(
        "results/manual.json",
        br#"{"email":"m@x.com","timestamp":"2023-12-31T00:00:00Z","note":"added by hand"}"#,
    );

    let listing = store.load_all(&Session::anonymous()).await.unwrap();
    assert_eq!(listing.results.len(), 1);
    assert_eq!(listing.results[0].extra["note"], "added by hand");
    assert_eq!(listing.skipped.len(), 1);
    assert_eq!(listing.skipped[0].name, "broken.json");
}

#[tokio::test]
async fn test_custom_directory_and_placeholder() {
    let api = InMemoryContentApi::new().with_policy(DirectoryPolicy::Explicit);
    let config = StoreConfig {
        directory: "/quiz/submissions/".to_string(),
        keep_file: ".keep".to_string(),
        ..StoreConfig::default()
    };
    let store = ResultStore::with_clock(api.clone(), SimulatedClock::new(T0), config);

    let saved = store
        .save(&session(), &QuizResult::new("a@x.com", "2024-01-01"))
        .await
        .unwrap();
    assert!(saved.path.starts_with("quiz/submissions/result-"));
    assert!(api.read("quiz/submissions/.keep").is_some());

    let report = store.delete_all(&session()).await.unwrap();
    assert_eq!(report.retained, vec![".keep".to_string()]);
}

#[tokio::test]
async fn test_concurrent_writer_changes_revision() {
    let (store, api, _) = setup(DirectoryPolicy::AutoCreate);
    let s = session();
    let saved = store
        .save(&s, &QuizResult::new("a@x.com", "2024-01-01"))
        .await
        .unwrap();

    // Overwriting requires the current revision
    let rewrite = PutFileRequest {
        message: "fix score".to_string(),
        content: "eyJlbWFpbCI6ImFAeC5jb20iLCJ0aW1lc3RhbXAiOiIyMDI0LTAxLTAyIn0=".to_string(),
        branch: "main".to_string(),
        sha: Some(saved.sha.clone()),
    };
    let updated = api
        .put_file(&saved.path, &rewrite, s.credential().unwrap())
        .await
        .unwrap();
    assert_ne!(updated.sha, saved.sha);

    // delete_all lists fresh revisions, so it is unaffected
    let report = store.delete_all(&s).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(api.file_count(), 0);
}

#[tokio::test]
async fn test_loosely_typed_records_are_listed_and_matched() {
    let (store, api, _) = setup(DirectoryPolicy::AutoCreate);
    let stored = [
        json!({"name": "Ada", "email": "a@x.com", "score": "80", "timestamp": "2024-01-03T00:00:00Z"}),
        json!({"name": null, "email": "b@x.com", "score": null, "timestamp": "2024-01-02T00:00:00Z"}),
        json!({
            "name": ["Grace", "Hopper"],
            "email": "c@x.com",
            "score": {"raw": 7, "max": 10},
            "timestamp": "2024-01-01T00:00:00Z",
            "answers": [{"q": 1, "a": null}, {"q": 2, "a": "b"}]
        }),
    ];
    for (i, value) in stored.iter().enumerate() {
        api.insert_raw(
            &format!("results/manual-{}.json", i),
            value.to_string().as_bytes(),
        );
    }

    let anonymous = Session::anonymous();
    let listed = store.list_all(&anonymous).await;
    let back: Vec<_> = listed
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
    assert_eq!(back, stored.to_vec());

    for email in ["A@X.COM", "b@x.com", "c@x.com"] {
        assert!(store.exists_by_email(&anonymous, email).await, "{}", email);
    }
}

#[tokio::test]
async fn test_loosely_typed_record_round_trips_through_save() {
    let (store, _, _) = setup(DirectoryPolicy::Explicit);
    let record: QuizResult = serde_json::from_value(json!({
        "name": null,
        "email": "a@x.com",
        "score": "80",
        "timestamp": "2024-01-01T00:00:00Z",
        "extra": {"nested": [null, true]}
    }))
    .unwrap();

    store.save(&session(), &record).await.unwrap();

    assert_eq!(store.list_all(&Session::anonymous()).await, vec![record]);
}
