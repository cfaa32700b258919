//! Clock Abstraction
//!
//! Filenames embed the creation time in milliseconds, so every write goes
//! through a clock. Production uses wall-clock time; tests and simulation
//! use a clock that only moves when told to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EpochMillis(pub u64);

impl EpochMillis {
    pub fn from_millis(ms: u64) -> Self {
        EpochMillis(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clock trait for creation timestamps
///
/// Implementations:
/// - `ProductionClock`: Uses real system time
/// - `SimulatedClock`: Uses controlled virtual time
pub trait StoreClock: Send + Sync + 'static {
    /// Get current time
    fn now(&self) -> EpochMillis;
}

/// Production clock using real system time
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionClock;

impl StoreClock for ProductionClock {
    fn now(&self) -> EpochMillis {
        use std::time::{SystemTime, UNIX_EPOCH};
        // A clock set before 1970 yields zero rather than aborting a save.
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        EpochMillis(ms)
    }
}

/// Simulated clock for deterministic testing
///
/// Time only advances when explicitly told to via `advance()` or `set()`.
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    time_ms: Arc<AtomicU64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    /// Create a new simulated clock starting at the given time
    pub fn new(start_ms: u64) -> Self {
        SimulatedClock {
            time_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        self.time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Advance time by milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.time_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set time to a specific value
    pub fn set(&self, time_ms: u64) {
        self.time_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl StoreClock for SimulatedClock {
    fn now(&self) -> EpochMillis {
        EpochMillis(self.time_ms.load(Ordering::SeqCst))
    }
}

impl<C: StoreClock> StoreClock for Arc<C> {
    fn now(&self) -> EpochMillis {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_clock_is_after_2020() {
        let now = ProductionClock.now();
        // 2020-01-01T00:00:00Z
        assert!(now.as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_simulated_clock_deterministic() {
        let clock = SimulatedClock::new(1000);

        assert_eq!(clock.now(), clock.now(), "Time should not advance on its own");

        clock.advance_ms(100);
        assert_eq!(clock.now().0, 1100);

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now().0, 2100);

        clock.set(5000);
        assert_eq!(clock.now().0, 5000);
    }

    #[test]
    fn test_simulated_clock_shared() {
        let clock = SimulatedClock::new(0);
        let clock2 = clock.clone();

        clock.advance_ms(100);
        assert_eq!(clock2.now().0, 100, "Clones should share state");
    }
}
