//! Simulated Content API with Fault Injection
//!
//! Wraps another backend and injects failures from a seeded RNG, so a
//! simulation run is reproducible from its seed. Covers the failure modes
//! the store has to survive: transport errors, listings that lag behind
//! writes, files listed but not yet readable, and writes whose response is
//! lost after the backend applied them.

use crate::backend::{
    ApiError, ApiFuture, ContentApi, ContentEntry, DeleteFileRequest, PutFileRequest,
};
use crate::rng::DeterministicRng;
use crate::store::Credential;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedApiConfig {
    /// Probability of a directory listing failing outright
    pub list_fail_prob: f64,
    /// Probability of a listing omitting some entries
    pub list_stale_prob: f64,
    /// Probability of a content fetch failing
    pub fetch_fail_prob: f64,
    /// Probability of a listed file not being readable yet
    pub fetch_missing_prob: f64,
    /// Probability of a write being rejected before it is applied
    pub put_fail_prob: f64,
    /// Probability of a write being applied but reported as failed
    pub put_lost_ack_prob: f64,
    /// Probability of a delete failing
    pub delete_fail_prob: f64,
    /// Simulated latency range in microseconds (min, max)
    pub latency_range_us: (u64, u64),
}

impl Default for SimulatedApiConfig {
    fn default() -> Self {
        SimulatedApiConfig {
            list_fail_prob: 0.02,
            list_stale_prob: 0.02,
            fetch_fail_prob: 0.01,
            fetch_missing_prob: 0.01,
            put_fail_prob: 0.02,
            put_lost_ack_prob: 0.005,
            delete_fail_prob: 0.02,
            latency_range_us: (0, 0),
        }
    }
}

impl SimulatedApiConfig {
    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedApiConfig {
            list_fail_prob: 0.10,
            list_stale_prob: 0.10,
            fetch_fail_prob: 0.05,
            fetch_missing_prob: 0.05,
            put_fail_prob: 0.10,
            put_lost_ack_prob: 0.05,
            delete_fail_prob: 0.15,
            latency_range_us: (0, 200),
        }
    }

    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedApiConfig {
            list_fail_prob: 0.0,
            list_stale_prob: 0.0,
            fetch_fail_prob: 0.0,
            fetch_missing_prob: 0.0,
            put_fail_prob: 0.0,
            put_lost_ack_prob: 0.0,
            delete_fail_prob: 0.0,
            latency_range_us: (0, 0),
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedApiStats {
    pub list_attempts: u64,
    pub list_failures: u64,
    pub stale_listings: u64,
    pub fetch_attempts: u64,
    pub fetch_failures: u64,
    pub fetch_missing: u64,
    pub put_attempts: u64,
    pub put_failures: u64,
    pub lost_acks: u64,
    pub delete_attempts: u64,
    pub delete_failures: u64,
}

struct SimulatedState {
    rng: DeterministicRng,
    stats: SimulatedApiStats,
}

/// Simulated backend that wraps another backend and injects faults
#[derive(Clone)]
pub struct SimulatedContentApi<A: ContentApi + Clone> {
    inner: A,
    config: SimulatedApiConfig,
    state: Arc<Mutex<SimulatedState>>,
}

impl<A: ContentApi + Clone> std::fmt::Debug for SimulatedContentApi<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedContentApi")
            .field("config", &self.config)
            .field("stats", &self.state.lock().stats)
            .finish()
    }
}

impl<A: ContentApi + Clone> SimulatedContentApi<A> {
    pub fn new(inner: A, seed: u64, config: SimulatedApiConfig) -> Self {
        SimulatedContentApi {
            inner,
            config,
            state: Arc::new(Mutex::new(SimulatedState {
                rng: DeterministicRng::new(seed),
                stats: SimulatedApiStats::default(),
            })),
        }
    }

    /// The wrapped backend, for inspecting ground truth
    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn stats(&self) -> SimulatedApiStats {
        self.state.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.state.lock().stats = SimulatedApiStats::default();
    }

    fn roll(&self, probability: f64) -> bool {
        self.state.lock().rng.gen_bool(probability)
    }

    fn record(&self, update: impl FnOnce(&mut SimulatedApiStats)) {
        update(&mut self.state.lock().stats);
    }

    async fn simulate_latency(&self) {
        let (min, max) = self.config.latency_range_us;
        if min == 0 && max == 0 {
            return;
        }
        let latency_us = self.state.lock().rng.gen_range(min, max.max(min + 1));
        if latency_us > 0 {
            tokio::time::sleep(Duration::from_micros(latency_us)).await;
        }
    }
}

impl<A: ContentApi + Clone> ContentApi for SimulatedContentApi<A> {
    fn list_dir<'a>(
        &'a self,
        path: &'a str,
        credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<ContentEntry>> {
        Box::pin(async move {
            self.record(|s| s.list_attempts += 1);
            self.simulate_latency().await;

            if self.roll(self.config.list_fail_prob) {
                self.record(|s| s.list_failures += 1);
                return Err(ApiError::Transport("simulated list failure".to_string()));
            }

            let mut entries = self.inner.list_dir(path, credential).await?;

            if entries.len() > 1 && self.roll(self.config.list_stale_prob) {
                let keep = {
                    let mut s = self.state.lock();
                    s.stats.stale_listings += 1;
                    s.rng.gen_range(1, entries.len() as u64) as usize
                };
                debug!(path, kept = keep, total = entries.len(), "simulated stale listing");
                entries.truncate(keep);
            }

            Ok(entries)
        })
    }

    fn fetch_raw<'a>(
        &'a self,
        entry: &'a ContentEntry,
        credential: Option<&'a Credential>,
    ) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.record(|s| s.fetch_attempts += 1);
            self.simulate_latency().await;

            if self.roll(self.config.fetch_fail_prob) {
                self.record(|s| s.fetch_failures += 1);
                return Err(ApiError::Transport("simulated fetch failure".to_string()));
            }
            if self.roll(self.config.fetch_missing_prob) {
                self.record(|s| s.fetch_missing += 1);
                return Err(ApiError::NotFound(entry.path.clone()));
            }

            self.inner.fetch_raw(entry, credential).await
        })
    }

    fn put_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a PutFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ContentEntry> {
        Box::pin(async move {
            self.record(|s| s.put_attempts += 1);
            self.simulate_latency().await;

            if self.roll(self.config.put_fail_prob) {
                self.record(|s| s.put_failures += 1);
                return Err(ApiError::Transport("simulated put failure".to_string()));
            }

            let entry = self.inner.put_file(path, request, credential).await?;

            if self.roll(self.config.put_lost_ack_prob) {
                self.record(|s| s.lost_acks += 1);
                return Err(ApiError::Transport(
                    "simulated connection reset after write".to_string(),
                ));
            }

            Ok(entry)
        })
    }

    fn delete_file<'a>(
        &'a self,
        path: &'a str,
        request: &'a DeleteFileRequest,
        credential: &'a Credential,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.record(|s| s.delete_attempts += 1);
            self.simulate_latency().await;

            if self.roll(self.config.delete_fail_prob) {
                self.record(|s| s.delete_failures += 1);
                return Err(ApiError::Transport("simulated delete failure".to_string()));
            }

            self.inner.delete_file(path, request, credential).await
        })
    }
}
