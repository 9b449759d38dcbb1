//! Per-backend circuit-breaker state (§3 "Circuit State", §4.B).

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Open the circuit for 30s after 2 consecutive failures.
pub const OPEN_DURATION_SHORT_SECS: i64 = 30;
/// Open the circuit for 2 minutes after 4 consecutive failures.
pub const OPEN_DURATION_LONG_SECS: i64 = 120;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitState {
    pub healthy_at: Option<DateTime<Utc>>,
    pub unhealthy_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub open_until: Option<DateTime<Utc>>,
}

impl CircuitState {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.open_until.map(|t| now < t).unwrap_or(false)
    }

    /// Record a success: reset counters, close the circuit.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.healthy_at = Some(now);
        self.consecutive_failures = 0;
        self.open_until = None;
    }

    /// Record a failure, opening the circuit per the breaker rules:
    /// 2 consecutive failures → 30s, 4 consecutive failures → 2min.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.unhealthy_at = Some(now);
        self.consecutive_failures += 1;
        if self.consecutive_failures >= 4 {
            self.open_until = Some(now + chrono::Duration::seconds(OPEN_DURATION_LONG_SECS));
        } else if self.consecutive_failures >= 2 {
            self.open_until = Some(now + chrono::Duration::seconds(OPEN_DURATION_SHORT_SECS));
        }
    }

    /// Force a re-probe on next selection.
    pub fn invalidate(&mut self) {
        self.open_until = None;
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_failures_open_short() {
        let mut c = CircuitState::default();
        let t0 = Utc::now();
        c.record_failure(t0);
        assert!(!c.is_open(t0));
        c.record_failure(t0);
        assert!(c.is_open(t0));
        assert!(!c.is_open(t0 + chrono::Duration::seconds(31)));
    }

    #[test]
    fn four_failures_open_long() {
        let mut c = CircuitState::default();
        let t0 = Utc::now();
        for _ in 0..4 {
            c.record_failure(t0);
        }
        assert!(c.is_open(t0 + chrono::Duration::seconds(100)));
        assert!(!c.is_open(t0 + chrono::Duration::seconds(121)));
    }

    #[test]
    fn success_resets() {
        let mut c = CircuitState::default();
        let t0 = Utc::now();
        c.record_failure(t0);
        c.record_failure(t0);
        assert!(c.is_open(t0));
        c.record_success(t0);
        assert!(!c.is_open(t0));
        assert_eq!(c.consecutive_failures, 0);
    }

    #[test]
    fn invalidate_forces_reprobe() {
        let mut c = CircuitState::default();
        let t0 = Utc::now();
        c.record_failure(t0);
        c.record_failure(t0);
        assert!(c.is_open(t0));
        c.invalidate();
        assert!(!c.is_open(t0));
    }
}
