//! Deterministic Simulation Testing for the Result Store
//!
//! Shadow-state harness that drives a `ResultStore` over a fault-injecting
//! backend:
//! - Deterministic random workload (save, list, exists, delete-all)
//! - Fault injection at the content API layer
//! - Invariant checking after reads and at the end of a run
//! - Seed-based reproducibility for debugging
//!
//! ```text
//! for seed in 0..1000 {
//!     let mut harness = ResultStoreDSTHarness::new(ResultStoreDSTConfig::moderate(seed));
//!     harness.run(200).await;
//!     harness.check_invariants().await;  // violations are recorded with the seed
//! }
//! ```
//!
//! Every saved record carries an `attempt` field, so a record read back can
//! be traced to the save that produced it. A save that failed may still have
//! landed (a write whose acknowledgement was lost), so the shadow state
//! tracks such files as "maybe present".

use crate::backend::{
    DirectoryPolicy, InMemoryContentApi, SimulatedApiConfig, SimulatedApiStats,
    SimulatedContentApi,
};
use crate::clock::{SimulatedClock, StoreClock};
use crate::config::StoreConfig;
use crate::rng::DeterministicRng;
use crate::store::{
    is_result_file, result_filename, Credential, DeleteReport, FailureKind, QuizResult,
    ResultStore, SaveError, Session,
};
use chrono::{DateTime, SecondsFormat};
use std::collections::{BTreeMap, HashMap, HashSet};

const START_MS: u64 = 1_704_067_200_000;
const DAY_MS: u64 = 86_400_000;
const ATTEMPT_FIELD: &str = "attempt";

/// Configuration for result store DST
#[derive(Debug, Clone)]
pub struct ResultStoreDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Backend fault configuration
    pub api_config: SimulatedApiConfig,
    pub store_config: StoreConfig,
    /// Whether the backend creates directories implicitly
    pub directory_policy: DirectoryPolicy,
    pub list_probability: f64,
    pub exists_probability: f64,
    pub delete_all_probability: f64,
    /// Probability that a save is attempted without a credential
    pub anonymous_probability: f64,
    /// Probability that a record's timestamp is earlier than its creation
    pub backdate_probability: f64,
    /// Number of distinct participant emails
    pub email_pool: u64,
}

impl Default for ResultStoreDSTConfig {
    fn default() -> Self {
        ResultStoreDSTConfig {
            seed: 0,
            api_config: SimulatedApiConfig::default(),
            store_config: StoreConfig::test(),
            directory_policy: DirectoryPolicy::Explicit,
            list_probability: 0.2,
            exists_probability: 0.15,
            delete_all_probability: 0.05,
            anonymous_probability: 0.05,
            backdate_probability: 0.3,
            email_pool: 8,
        }
    }
}

impl ResultStoreDSTConfig {
    pub fn new(seed: u64) -> Self {
        ResultStoreDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Calm mode - no fault injection
    pub fn calm(seed: u64) -> Self {
        ResultStoreDSTConfig {
            seed,
            api_config: SimulatedApiConfig::no_faults(),
            ..Default::default()
        }
    }

    /// Moderate fault injection
    pub fn moderate(seed: u64) -> Self {
        ResultStoreDSTConfig {
            seed,
            api_config: SimulatedApiConfig::default(),
            ..Default::default()
        }
    }

    /// Chaos mode - aggressive fault injection
    pub fn chaos(seed: u64) -> Self {
        ResultStoreDSTConfig {
            seed,
            api_config: SimulatedApiConfig::high_chaos(),
            delete_all_probability: 0.08,
            ..Default::default()
        }
    }

    /// Reads see everything that was written
    fn exact_reads(&self) -> bool {
        let c = &self.api_config;
        c.list_fail_prob == 0.0
            && c.list_stale_prob == 0.0
            && c.fetch_fail_prob == 0.0
            && c.fetch_missing_prob == 0.0
    }
}

/// Store operation type
#[derive(Debug, Clone)]
pub enum StoreOperation {
    Save {
        email: String,
        anonymous: bool,
        backdate_ms: u64,
    },
    List,
    Exists {
        email: String,
    },
    DeleteAll,
}

/// Outcome of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Success,
    /// Failed in a way fault injection can explain
    Failed(String),
    /// Refused before any request was made
    Rejected,
}

/// Recorded operation for history tracking
#[derive(Debug, Clone)]
pub struct RecordedOperation {
    pub id: u64,
    pub operation: StoreOperation,
    pub outcome: OperationOutcome,
    pub timestamp_ms: u64,
}

/// Whether a file is known to exist in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Confirmed,
    /// The request failed but may have been applied
    Maybe,
}

#[derive(Debug, Clone)]
struct ShadowFile {
    attempt: u64,
    email: String,
    presence: Presence,
}

/// Workload generator
pub struct StoreWorkload {
    rng: DeterministicRng,
    config: ResultStoreDSTConfig,
}

impl StoreWorkload {
    pub fn new(config: ResultStoreDSTConfig) -> Self {
        StoreWorkload {
            rng: DeterministicRng::new(config.seed),
            config,
        }
    }

    fn email(&mut self) -> String {
        let n = self.rng.gen_range(0, self.config.email_pool.max(1));
        format!("user{}@example.com", n)
    }

    /// Generate the next operation
    pub fn next_operation(&mut self) -> StoreOperation {
        let roll = self.rng.next_u64() as f64 / u64::MAX as f64;
        let c = &self.config;
        let delete_cut = c.delete_all_probability;
        let list_cut = delete_cut + c.list_probability;
        let exists_cut = list_cut + c.exists_probability;

        if roll < delete_cut {
            StoreOperation::DeleteAll
        } else if roll < list_cut {
            StoreOperation::List
        } else if roll < exists_cut {
            let email = self.email();
            let email = if self.rng.gen_bool(0.5) {
                email.to_uppercase()
            } else {
                email
            };
            StoreOperation::Exists { email }
        } else {
            let anonymous = self.rng.gen_bool(self.config.anonymous_probability);
            let backdate_ms = if self.rng.gen_bool(self.config.backdate_probability) {
                self.rng.gen_range(1, DAY_MS)
            } else {
                0
            };
            StoreOperation::Save {
                email: self.email(),
                anonymous,
                backdate_ms,
            }
        }
    }

    /// Milliseconds to advance the clock before the next operation
    fn tick(&mut self) -> u64 {
        self.rng.gen_range(1, 5_000)
    }
}

/// Result of a DST run
#[derive(Debug, Clone)]
pub struct ResultStoreDSTResult {
    /// Seed used
    pub seed: u64,
    pub total_operations: u64,
    pub successful_operations: u64,
    /// Failed operations (expected under faults)
    pub failed_operations: u64,
    pub saves: u64,
    pub lists: u64,
    pub delete_runs: u64,
    pub files_deleted: u64,
    /// Backend fault statistics
    pub api_stats: SimulatedApiStats,
    pub invariant_violations: Vec<String>,
    pub history: Vec<RecordedOperation>,
}

impl ResultStoreDSTResult {
    pub fn new(seed: u64) -> Self {
        ResultStoreDSTResult {
            seed,
            total_operations: 0,
            successful_operations: 0,
            failed_operations: 0,
            saves: 0,
            lists: 0,
            delete_runs: 0,
            files_deleted: 0,
            api_stats: SimulatedApiStats::default(),
            invariant_violations: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops ({} ok, {} failed), {} saves, {} lists, {} delete runs ({} files), {} violations",
            self.seed,
            self.total_operations,
            self.successful_operations,
            self.failed_operations,
            self.saves,
            self.lists,
            self.delete_runs,
            self.files_deleted,
            self.invariant_violations.len()
        )
    }
}

type DSTApi = SimulatedContentApi<InMemoryContentApi>;

/// Main DST harness for the result store
pub struct ResultStoreDSTHarness {
    config: ResultStoreDSTConfig,
    store: ResultStore<DSTApi, SimulatedClock>,
    /// Fault-free view of the same backend state
    oracle: ResultStore<InMemoryContentApi, SimulatedClock>,
    inner: InMemoryContentApi,
    clock: SimulatedClock,
    session: Session,
    workload: StoreWorkload,
    /// Ground truth: files that exist or may exist, by name
    shadow: BTreeMap<String, ShadowFile>,
    /// Every attempted save, by attempt id
    attempts: HashMap<u64, String>,
    result: ResultStoreDSTResult,
}

impl ResultStoreDSTHarness {
    pub fn new(config: ResultStoreDSTConfig) -> Self {
        let inner = InMemoryContentApi::new().with_policy(config.directory_policy);
        // Different seed for the backend
        let api = SimulatedContentApi::new(
            inner.clone(),
            config.seed.wrapping_add(1),
            config.api_config.clone(),
        );
        let clock = SimulatedClock::new(START_MS);
        let store = ResultStore::with_clock(api, clock.clone(), config.store_config.clone());
        let oracle =
            ResultStore::with_clock(inner.clone(), clock.clone(), config.store_config.clone());
        let session = Credential::new("dst-token")
            .map(Session::authenticated)
            .unwrap_or_default();

        ResultStoreDSTHarness {
            workload: StoreWorkload::new(config.clone()),
            result: ResultStoreDSTResult::new(config.seed),
            config,
            store,
            oracle,
            inner,
            clock,
            session,
            shadow: BTreeMap::new(),
            attempts: HashMap::new(),
        }
    }

    /// Run the workload for a number of operations
    pub async fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            let op = self.workload.next_operation();
            self.clock.advance_ms(self.workload.tick());
            self.execute_operation(op).await;
        }
    }

    async fn execute_operation(&mut self, op: StoreOperation) {
        self.result.total_operations += 1;
        let op_id = self.result.total_operations;

        let outcome = match &op {
            StoreOperation::Save {
                email,
                anonymous,
                backdate_ms,
            } => self.execute_save(op_id, email, *anonymous, *backdate_ms).await,
            StoreOperation::List => self.execute_list().await,
            StoreOperation::Exists { email } => self.execute_exists(email).await,
            StoreOperation::DeleteAll => self.execute_delete_all().await,
        };

        match outcome {
            OperationOutcome::Success | OperationOutcome::Rejected => {
                self.result.successful_operations += 1
            }
            OperationOutcome::Failed(_) => self.result.failed_operations += 1,
        }
        self.result.history.push(RecordedOperation {
            id: op_id,
            operation: op,
            outcome,
            timestamp_ms: self.clock.now().as_millis(),
        });
    }

    async fn execute_save(
        &mut self,
        attempt: u64,
        email: &str,
        anonymous: bool,
        backdate_ms: u64,
    ) -> OperationOutcome {
        self.result.saves += 1;
        let now = self.clock.now();
        let created = now.as_millis().saturating_sub(backdate_ms);
        let timestamp = DateTime::from_timestamp_millis(created as i64)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "1970-01-01T00:00:00.000Z".to_string());
        let record = QuizResult::new(email, timestamp)
            .with_name(format!("Participant {}", attempt))
            .with_score(if attempt % 5 == 0 {
                serde_json::Value::from((attempt % 101).to_string())
            } else {
                serde_json::Value::from(attempt % 101)
            })
            .with_field(ATTEMPT_FIELD, attempt);

        if anonymous {
            let before = self.inner.file_count();
            let outcome = self.store.save(&Session::anonymous(), &record).await;
            if outcome != Err(SaveError::NotAuthorized) {
                self.violation(format!("anonymous save {} returned {:?}", attempt, outcome));
            }
            if self.inner.file_count() != before {
                self.violation(format!("anonymous save {} changed the backend", attempt));
            }
            return OperationOutcome::Rejected;
        }

        let filename = result_filename(now, email);
        self.attempts.insert(attempt, filename.clone());

        match self.store.save(&self.session, &record).await {
            Ok(saved) => {
                if saved.filename != filename {
                    self.violation(format!(
                        "save {} wrote {} instead of {}",
                        attempt, saved.filename, filename
                    ));
                }
                self.track(filename, attempt, email, Presence::Confirmed);
                OperationOutcome::Success
            }
            Err(e) => {
                if matches!(e.kind(), FailureKind::Credential | FailureKind::InvalidRecord) {
                    self.violation(format!("save {} failed without a fault: {}", attempt, e));
                }
                self.track(filename, attempt, email, Presence::Maybe);
                OperationOutcome::Failed(e.to_string())
            }
        }
    }

    fn track(&mut self, filename: String, attempt: u64, email: &str, presence: Presence) {
        self.shadow.insert(
            filename,
            ShadowFile {
                attempt,
                email: email.to_string(),
                presence,
            },
        );
    }

    async fn execute_list(&mut self) -> OperationOutcome {
        self.result.lists += 1;
        let listing = match self.store.load_all(&Session::anonymous()).await {
            Ok(listing) => listing,
            Err(e) => return OperationOutcome::Failed(e.to_string()),
        };

        self.check_order(&listing.results, "list");
        let mut seen = HashSet::new();
        for record in &listing.results {
            let Some(attempt) = attempt_of(record) else {
                self.violation(format!("listed record without attempt: {:?}", record));
                continue;
            };
            if !seen.insert(attempt) {
                self.violation(format!("attempt {} listed twice", attempt));
            }
            let known = self
                .attempts
                .get(&attempt)
                .and_then(|name| self.shadow.get(name))
                .is_some_and(|f| f.attempt == attempt);
            if !known {
                self.violation(format!("attempt {} listed but never stored or deleted", attempt));
            }
        }

        if self.config.exact_reads() {
            if !listing.skipped.is_empty() {
                self.violation(format!("fault-free listing skipped {:?}", listing.skipped));
            }
            let confirmed = self.confirmed_count();
            if listing.results.len() < confirmed {
                self.violation(format!(
                    "fault-free listing returned {} of {} confirmed records",
                    listing.results.len(),
                    confirmed
                ));
            }
        }
        OperationOutcome::Success
    }

    async fn execute_exists(&mut self, email: &str) -> OperationOutcome {
        let found = self.store.exists_by_email(&Session::anonymous(), email).await;
        let lower = email.to_lowercase();
        let confirmed = self
            .shadow
            .values()
            .any(|f| f.presence == Presence::Confirmed && f.email.to_lowercase() == lower);
        let possible = self
            .shadow
            .values()
            .any(|f| f.email.to_lowercase() == lower);

        if found && !possible {
            self.violation(format!("exists({}) true with no such record", email));
        }
        if !found && confirmed && self.config.exact_reads() {
            self.violation(format!("exists({}) false for a confirmed record", email));
        }
        OperationOutcome::Success
    }

    async fn execute_delete_all(&mut self) -> OperationOutcome {
        let report = match self.store.delete_all(&self.session).await {
            Ok(report) => report,
            Err(e) => {
                if e.kind() == FailureKind::Credential {
                    self.violation(format!("delete_all rejected credential: {}", e));
                }
                return OperationOutcome::Failed(e.to_string());
            }
        };
        self.result.delete_runs += 1;
        self.result.files_deleted += report.deleted.len() as u64;
        self.check_delete_report(&report);

        for name in &report.deleted {
            self.shadow.remove(name);
        }
        for failed in &report.failed {
            if let Some(file) = self.shadow.get_mut(&failed.name) {
                file.presence = Presence::Maybe;
            }
        }

        if report.is_complete() {
            OperationOutcome::Success
        } else {
            OperationOutcome::Failed(format!("{} deletes failed", report.failed_count()))
        }
    }

    fn check_delete_report(&mut self, report: &DeleteReport) {
        let keep = self.config.store_config.keep_file.clone();
        if report.deleted.contains(&keep) || report.failed.iter().any(|f| f.name == keep) {
            self.violation("placeholder was targeted for deletion".to_string());
        }
        for name in &report.deleted {
            if report.failed.iter().any(|f| &f.name == name) {
                self.violation(format!("{} both deleted and failed", name));
            }
            let path = self.config.store_config.file_path(name);
            if self.inner.read(&path).is_some() {
                self.violation(format!("{} reported deleted but still present", name));
            }
        }
    }

    fn check_order(&mut self, results: &[QuizResult], context: &str) {
        let out_of_order = results.windows(2).any(|pair| {
            match (pair[0].parsed_timestamp(), pair[1].parsed_timestamp()) {
                (Some(a), Some(b)) => a < b,
                (None, Some(_)) => true,
                _ => false,
            }
        });
        if out_of_order {
            self.violation(format!("{} returned records out of order", context));
        }
    }

    fn confirmed_count(&self) -> usize {
        self.shadow
            .values()
            .filter(|f| f.presence == Presence::Confirmed)
            .count()
    }

    fn violation(&mut self, message: String) {
        self.result.invariant_violations.push(message);
    }

    /// Check invariants against the fault-free view of the backend
    pub async fn check_invariants(&mut self) {
        let listing = match self.oracle.load_all(&Session::anonymous()).await {
            Ok(listing) => listing,
            Err(e) => {
                self.violation(format!("fault-free listing failed: {}", e));
                return;
            }
        };

        // Invariant 1: stored records read back newest first, none skipped
        self.check_order(&listing.results, "final listing");
        if !listing.skipped.is_empty() {
            self.violation(format!("unreadable files in backend: {:?}", listing.skipped));
        }

        // Invariant 2: every confirmed save is durable
        let stored: HashMap<u64, &QuizResult> = listing
            .results
            .iter()
            .filter_map(|r| attempt_of(r).map(|a| (a, r)))
            .collect();
        let missing: Vec<u64> = self
            .shadow
            .values()
            .filter(|f| f.presence == Presence::Confirmed && !stored.contains_key(&f.attempt))
            .map(|f| f.attempt)
            .collect();
        for attempt in missing {
            self.violation(format!("confirmed save {} is missing", attempt));
        }

        // Invariant 3: nothing is stored that the shadow state cannot explain
        let unexplained: Vec<u64> = stored
            .keys()
            .filter(|a| {
                self.attempts
                    .get(a)
                    .and_then(|name| self.shadow.get(name))
                    .is_none()
            })
            .copied()
            .collect();
        for attempt in unexplained {
            self.violation(format!("attempt {} stored but deleted or never saved", attempt));
        }

        // Invariant 4: the directory holds only records and the placeholder
        let prefix = format!("{}/", self.config.store_config.directory_path());
        let keep = self.config.store_config.keep_file.clone();
        let stray: Vec<String> = self
            .inner
            .paths()
            .into_iter()
            .filter_map(|p| p.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| *name != keep && !is_result_file(name))
            .collect();
        if !stray.is_empty() {
            self.violation(format!("unexpected files: {:?}", stray));
        }

        self.result.api_stats = self.store.api().stats();
    }

    pub fn result(&self) -> &ResultStoreDSTResult {
        &self.result
    }

    pub fn into_result(self) -> ResultStoreDSTResult {
        self.result
    }
}

fn attempt_of(record: &QuizResult) -> Option<u64> {
    record.extra.get(ATTEMPT_FIELD).and_then(|v| v.as_u64())
}

/// Run a batch of DST runs with consecutive seeds
pub async fn run_dst_batch(
    base_seed: u64,
    count: usize,
    ops_per_run: usize,
    config_fn: impl Fn(u64) -> ResultStoreDSTConfig,
) -> Vec<ResultStoreDSTResult> {
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let seed = base_seed + i as u64;
        let mut harness = ResultStoreDSTHarness::new(config_fn(seed));
        harness.run(ops_per_run).await;
        harness.check_invariants().await;
        results.push(harness.into_result());
    }

    results
}

/// Summary of batch results
pub fn summarize_batch(results: &[ResultStoreDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed_seeds: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.seed)
        .collect();

    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let total_saves: u64 = results.iter().map(|r| r.saves).sum();
    let total_deleted: u64 = results.iter().map(|r| r.files_deleted).sum();

    let mut summary = format!(
        "Batch: {}/{} passed, {} total ops, {} saves, {} files deleted",
        passed, total, total_ops, total_saves, total_deleted
    );

    if !failed_seeds.is_empty() {
        summary.push_str(&format!("\nFailed seeds: {:?}", failed_seeds));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dst_harness_calm() {
        let mut harness = ResultStoreDSTHarness::new(ResultStoreDSTConfig::calm(42));

        harness.run(100).await;
        harness.check_invariants().await;

        let result = harness.result();
        assert!(
            result.is_success(),
            "Calm mode should not have invariant violations: {:?}",
            result.invariant_violations
        );
        assert_eq!(result.total_operations, 100);
        assert_eq!(result.failed_operations, 0);
    }

    #[tokio::test]
    async fn test_dst_harness_with_faults() {
        let mut harness = ResultStoreDSTHarness::new(ResultStoreDSTConfig::moderate(123));

        harness.run(200).await;
        harness.check_invariants().await;

        let result = harness.result();
        println!("{}", result.summary());
        assert!(
            result.is_success(),
            "Invariants must hold under faults: {:?}",
            result.invariant_violations
        );
    }

    #[tokio::test]
    async fn test_dst_deterministic() {
        let seed = 12345;

        let mut first = ResultStoreDSTHarness::new(ResultStoreDSTConfig::moderate(seed));
        first.run(80).await;
        let mut second = ResultStoreDSTHarness::new(ResultStoreDSTConfig::moderate(seed));
        second.run(80).await;

        let a = first.result();
        let b = second.result();
        assert_eq!(
            (a.successful_operations, a.failed_operations, a.files_deleted),
            (b.successful_operations, b.failed_operations, b.files_deleted),
            "Same seed should produce same results"
        );
    }

    #[tokio::test]
    async fn test_workload_mixes_operations() {
        let mut workload = StoreWorkload::new(ResultStoreDSTConfig::calm(7));
        let ops: Vec<_> = (0..500).map(|_| workload.next_operation()).collect();

        assert!(ops.iter().any(|o| matches!(o, StoreOperation::Save { anonymous: false, .. })));
        assert!(ops.iter().any(|o| matches!(o, StoreOperation::Save { anonymous: true, .. })));
        assert!(ops.iter().any(|o| matches!(o, StoreOperation::List)));
        assert!(ops.iter().any(|o| matches!(o, StoreOperation::Exists { .. })));
        assert!(ops.iter().any(|o| matches!(o, StoreOperation::DeleteAll)));
    }

    #[tokio::test]
    async fn test_dst_batch_calm() {
        let results = run_dst_batch(1000, 10, 50, ResultStoreDSTConfig::calm).await;
        println!("{}", summarize_batch(&results));

        assert!(
            results.iter().all(|r| r.is_success()),
            "All calm runs should pass"
        );
    }
}
