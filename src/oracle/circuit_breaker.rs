//! Circuit breaker guarding calls to the model server
//!
//! One breaker entry per oracle operation (`tokenize`, `detokenize`, `generate`),
//! so a failing generation endpoint does not block tokenization.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected until the reset timeout elapses
    Open,
    /// Trial calls pass; the next failure reopens
    HalfOpen,
}

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    consecutive_failures: usize,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            opened_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

pub struct CircuitBreaker {
    entries: Mutex<HashMap<&'static str, BreakerEntry>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, BreakerEntry>> {
        // A panic while holding the lock leaves the map consistent
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether calls for `operation` should be rejected right now
    pub fn is_open(&self, operation: &'static str) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(operation).or_default();

        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => false,
            BreakerState::Open => match entry.opened_at {
                Some(opened_at) if opened_at.elapsed() >= self.config.reset_timeout => {
                    entry.state = BreakerState::HalfOpen;
                    false
                }
                _ => true,
            },
        }
    }

    pub fn mark_success(&self, operation: &'static str) {
        let mut entries = self.lock();
        entries.insert(operation, BreakerEntry::default());
    }

    pub fn mark_failure(&self, operation: &'static str) {
        let mut entries = self.lock();
        let entry = entries.entry(operation).or_default();

        let now = Instant::now();
        entry.consecutive_failures += 1;
        entry.last_failure = Some(now);

        if entry.state == BreakerState::HalfOpen
            || entry.consecutive_failures >= self.config.failure_threshold
        {
            entry.state = BreakerState::Open;
            entry.opened_at = Some(now);
        }
    }

    pub fn state(&self, operation: &'static str) -> BreakerState {
        self.lock()
            .get(operation)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }

    pub fn stats(&self, operation: &'static str) -> BreakerStats {
        let entries = self.lock();
        let entry = entries.get(operation).cloned().unwrap_or_default();
        BreakerStats {
            state: entry.state,
            consecutive_failures: entry.consecutive_failures,
            last_failure: entry.last_failure,
        }
    }

    pub fn reset_all(&self) {
        self.lock().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub consecutive_failures: usize,
    pub last_failure: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: usize, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
        })
    }

    #[test]
    fn test_closed_by_default() {
        let breaker = CircuitBreaker::default();
        assert!(!breaker.is_open("generate"));
        assert_eq!(breaker.state("generate"), BreakerState::Closed);
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(3, Duration::from_secs(30));

        breaker.mark_failure("generate");
        breaker.mark_failure("generate");
        assert!(!breaker.is_open("generate"));

        breaker.mark_failure("generate");
        assert!(breaker.is_open("generate"));
        assert_eq!(breaker.state("generate"), BreakerState::Open);
    }

    #[test]
    fn test_operations_are_independent() {
        let breaker = breaker(1, Duration::from_secs(30));

        breaker.mark_failure("generate");
        assert!(breaker.is_open("generate"));
        assert!(!breaker.is_open("tokenize"));
    }

    #[test]
    fn test_success_resets() {
        let breaker = breaker(3, Duration::from_secs(30));

        breaker.mark_failure("decode");
        breaker.mark_failure("decode");
        breaker.mark_success("decode");

        let stats = breaker.stats("decode");
        assert_eq!(stats.state, BreakerState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert!(stats.last_failure.is_none());
    }

    #[test]
    fn test_half_open_after_timeout_and_reopens_on_failure() {
        let breaker = breaker(2, Duration::from_millis(50));

        breaker.mark_failure("generate");
        breaker.mark_failure("generate");
        assert!(breaker.is_open("generate"));

        std::thread::sleep(Duration::from_millis(80));

        assert!(!breaker.is_open("generate"));
        assert_eq!(breaker.state("generate"), BreakerState::HalfOpen);

        breaker.mark_failure("generate");
        assert!(breaker.is_open("generate"));
    }

    #[test]
    fn test_reset_all() {
        let breaker = breaker(1, Duration::from_secs(30));
        breaker.mark_failure("generate");
        breaker.reset_all();
        assert_eq!(breaker.state("generate"), BreakerState::Closed);
    }
}
