//! Circuit-breaker state for the agent dispatcher.
//!
//! Process-wide singleton: only [`crate::services::agent_dispatch`] mutates
//! it, always under its owning lock.

use chrono::{DateTime, Utc};

/// Open/closed bookkeeping for the dispatcher's circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitState {
    pub failures: u32,
    pub open_until: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self { failures: 0, open_until: None, last_success: None }
    }
}

impl CircuitState {
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.open_until.is_some_and(|until| now < until)
    }

    pub fn record_failure(&mut self, threshold: u32, open_duration: chrono::Duration, now: DateTime<Utc>) {
        self.failures += 1;
        if self.failures >= threshold {
            self.open_until = Some(now + open_duration);
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.failures = 0;
        self.open_until = None;
        self.last_success = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_and_closes_after_duration() {
        let mut state = CircuitState::default();
        let t0 = Utc::now();
        for _ in 0..4 {
            state.record_failure(5, chrono::Duration::seconds(60), t0);
        }
        assert!(!state.is_open(t0));
        state.record_failure(5, chrono::Duration::seconds(60), t0);
        assert!(state.is_open(t0));
        assert!(state.is_open(t0 + chrono::Duration::seconds(59)));
        assert!(!state.is_open(t0 + chrono::Duration::seconds(61)));
    }

    #[test]
    fn success_resets_failure_count() {
        let mut state = CircuitState::default();
        let t0 = Utc::now();
        state.record_failure(5, chrono::Duration::seconds(60), t0);
        state.record_success(t0);
        assert_eq!(state.failures, 0);
        assert!(!state.is_open(t0));
    }
}
