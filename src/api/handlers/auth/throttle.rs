//! Per-address login failure tracking.
//!
//! Failures are counted per client address inside a sliding window: a record
//! whose last failure is older than the window is treated as absent, and the
//! next failure starts again at 1. Records are evicted lazily on access and in
//! bulk by the periodic sweep.
//!
//! Scaling: state is process-local. Multi-instance deployments need a shared
//! counter behind the `FailureTracker` trait.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::clock::Clock;

pub(crate) const DEFAULT_FAILURE_WINDOW_MINUTES: i64 = 15;

pub trait FailureTracker: Send + Sync {
    /// Count a failure and return the post-increment total.
    fn record_failure(&self, key: &str) -> u32;
    /// Current in-window total, 0 when absent or stale.
    fn current_count(&self, key: &str) -> u32;
    /// Forget the key, called after a successful login.
    fn clear_failures(&self, key: &str);
    /// Drop every stale record, returning how many were removed.
    fn prune(&self) -> usize;
}

#[derive(Clone, Copy, Debug)]
struct FailureRecord {
    count: u32,
    last_failure: DateTime<Utc>,
}

pub struct LoginThrottle {
    window: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, FailureRecord>>,
}

impl LoginThrottle {
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            window,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn is_stale(&self, record: &FailureRecord, now: DateTime<Utc>) -> bool {
        now - record.last_failure > self.window
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.records.lock().len()
    }
}

impl std::fmt::Debug for LoginThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginThrottle")
            .field("window", &self.window)
            .field("tracked", &self.records.lock().len())
            .finish()
    }
}

impl FailureTracker for LoginThrottle {
    fn record_failure(&self, key: &str) -> u32 {
        let now = self.clock.now();
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(key) {
            if !self.is_stale(record, now) {
                record.count = record.count.saturating_add(1);
                record.last_failure = now;
                return record.count;
            }
        }
        records.insert(
            key.to_string(),
            FailureRecord {
                count: 1,
                last_failure: now,
            },
        );
        1
    }

    fn current_count(&self, key: &str) -> u32 {
        let now = self.clock.now();
        // Eviction mutates the map, so reads take the same lock as writes.
        let mut records = self.records.lock();
        let Some(record) = records.get(key).copied() else {
            return 0;
        };
        if self.is_stale(&record, now) {
            records.remove(key);
            return 0;
        }
        record.count
    }

    fn clear_failures(&self, key: &str) {
        self.records.lock().remove(key);
    }

    fn prune(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !self.is_stale(record, now));
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::clock::ManualClock;
    use super::*;
    use chrono::TimeZone;

    fn throttle() -> (Arc<ManualClock>, LoginThrottle) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let throttle = LoginThrottle::new(
            clock.clone(),
            Duration::minutes(DEFAULT_FAILURE_WINDOW_MINUTES),
        );
        (clock, throttle)
    }

    #[test]
    fn absent_key_counts_zero() {
        let (_, throttle) = throttle();
        assert_eq!(throttle.current_count("10.0.0.5"), 0);
    }

    #[test]
    fn failures_accumulate_within_window() {
        let (clock, throttle) = throttle();
        assert_eq!(throttle.record_failure("10.0.0.5"), 1);
        clock.advance(Duration::minutes(1));
        assert_eq!(throttle.record_failure("10.0.0.5"), 2);
        clock.advance(Duration::minutes(1));
        assert_eq!(throttle.record_failure("10.0.0.5"), 3);
        assert_eq!(throttle.current_count("10.0.0.5"), 3);
        assert_eq!(throttle.current_count("10.0.0.6"), 0);
    }

    #[test]
    fn window_slides_with_each_failure() {
        let (clock, throttle) = throttle();
        throttle.record_failure("k");
        clock.advance(Duration::minutes(14));
        throttle.record_failure("k");
        clock.advance(Duration::minutes(14));
        assert_eq!(throttle.record_failure("k"), 3);
    }

    #[test]
    fn stale_record_restarts_at_one() {
        let (clock, throttle) = throttle();
        for _ in 0..3 {
            throttle.record_failure("10.0.0.5");
        }
        clock.advance(Duration::minutes(16));
        assert_eq!(throttle.current_count("10.0.0.5"), 0);
        assert_eq!(throttle.record_failure("10.0.0.5"), 1);
    }

    #[test]
    fn stale_record_restarts_without_prior_read() {
        let (clock, throttle) = throttle();
        for _ in 0..4 {
            throttle.record_failure("k");
        }
        clock.advance(Duration::minutes(16));
        assert_eq!(throttle.record_failure("k"), 1);
    }

    #[test]
    fn clear_then_count_is_zero() {
        let (_, throttle) = throttle();
        throttle.record_failure("k");
        throttle.record_failure("k");
        throttle.clear_failures("k");
        assert_eq!(throttle.current_count("k"), 0);
        throttle.clear_failures("never-seen");
        assert_eq!(throttle.current_count("never-seen"), 0);
    }

    #[test]
    fn prune_drops_only_stale_records() {
        let (clock, throttle) = throttle();
        throttle.record_failure("old");
        clock.advance(Duration::minutes(10));
        throttle.record_failure("fresh");
        clock.advance(Duration::minutes(6));
        assert_eq!(throttle.prune(), 1);
        assert_eq!(throttle.current_count("fresh"), 1);
    }

    #[test]
    fn concurrent_failures_are_not_lost() {
        let (_, throttle) = throttle();
        let throttle = Arc::new(throttle);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let throttle = throttle.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        throttle.record_failure("shared");
                        let _ = throttle.current_count("shared");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(throttle.current_count("shared"), 400);
    }
}
