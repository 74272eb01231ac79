//! Per-provider sliding-window circuit breaker. No half-open state: once
//! `recovery_s` has elapsed past `opened_at`, the next admission check is
//! unconditionally accepted and the breaker resets.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    /// `0` disables the breaker strictly: it never opens.
    pub failure_threshold: u32,
    pub recovery_s: u64,
    pub window_s: u64,
}

#[derive(Debug, Clone)]
pub struct BreakerStatus {
    pub is_open: bool,
    pub opened_at: Option<Instant>,
    pub failure_count: usize,
}

#[derive(Debug)]
struct BreakerState {
    is_open: bool,
    opened_at: Option<Instant>,
    failures: VecDeque<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(BreakerState {
                is_open: false,
                opened_at: None,
                failures: VecDeque::new(),
            }),
        }
    }

    /// Returns `false` iff the breaker is open and the recovery window has
    /// not yet elapsed. Recovering the breaker (transition to closed) is
    /// folded into this call, matching the "no half-open" contract.
    pub fn admit(&self) -> bool {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        if !state.is_open {
            return true;
        }
        let opened_at = state.opened_at.expect("is_open implies opened_at is set");
        if opened_at.elapsed() >= Duration::from_secs(self.policy.recovery_s) {
            state.is_open = false;
            state.opened_at = None;
            state.failures.clear();
            true
        } else {
            false
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.failures.clear();
    }

    /// Records a failure, prunes the window, and opens the breaker if the
    /// threshold is now met. Returns `true` iff this call just opened it.
    pub fn record_failure(&self) -> bool {
        if self.policy.failure_threshold == 0 {
            return false;
        }
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        let now = Instant::now();
        state.failures.push_back(now);
        let window = Duration::from_secs(self.policy.window_s);
        while let Some(oldest) = state.failures.front() {
            if now.duration_since(*oldest) > window {
                state.failures.pop_front();
            } else {
                break;
            }
        }
        if !state.is_open && state.failures.len() as u32 >= self.policy.failure_threshold {
            state.is_open = true;
            state.opened_at = Some(now);
            true
        } else {
            false
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let state = self.state.lock().expect("breaker mutex poisoned");
        BreakerStatus {
            is_open: state.is_open,
            opened_at: state.opened_at,
            failure_count: state.failures.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u32) -> BreakerPolicy {
        BreakerPolicy { failure_threshold: threshold, recovery_s: 30, window_s: 60 }
    }

    #[test]
    fn disabled_breaker_never_opens() {
        let breaker = CircuitBreaker::new(policy(0));
        for _ in 0..100 {
            assert!(!breaker.record_failure());
        }
        assert!(breaker.admit());
    }

    #[test]
    fn opens_once_threshold_reached_and_denies_admission() {
        let breaker = CircuitBreaker::new(policy(3));
        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        assert!(breaker.record_failure());
        assert!(!breaker.admit());
        assert!(breaker.status().is_open);
    }

    #[test]
    fn success_clears_failure_window() {
        let breaker = CircuitBreaker::new(policy(3));
        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        breaker.record_success();
        assert!(!breaker.record_failure());
        assert!(breaker.admit());
    }

    #[test]
    fn recovery_resets_breaker_without_half_open_probe() {
        let breaker = CircuitBreaker::new(BreakerPolicy {
            failure_threshold: 1,
            recovery_s: 0,
            window_s: 60,
        });
        assert!(breaker.record_failure());
        assert!(!breaker.state.lock().unwrap().failures.is_empty());
        assert!(breaker.admit());
        assert!(!breaker.status().is_open);
    }
}
