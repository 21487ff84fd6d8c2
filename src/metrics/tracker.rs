//! In-flight request tracking, global and per user.
//!
//! One mutex guards the whole state so the global counter, the per-user
//! counter and the peak move as a single atomic step. Callers must pair
//! `begin`/`end`; the tracker does not enforce pairing.

use std::collections::HashMap;
use std::sync::Mutex;

/// Per-user in-flight counters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserInFlight {
    pub current: u64,
    pub peak: u64,
}

/// A consistent point-in-time read of the tracker.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConcurrencySnapshot {
    pub current: u64,
    pub peak: u64,
    pub per_user: HashMap<String, UserInFlight>,
}

#[derive(Debug, Default)]
pub struct ConcurrencyTracker {
    state: Mutex<ConcurrencySnapshot>,
}

impl ConcurrencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one request in flight for `user_id`. Raises the global and
    /// per-user peaks inside the same critical section.
    pub fn begin(&self, user_id: &str) {
        let mut state = self.state.lock().expect("concurrency tracker poisoned");
        state.current += 1;
        if state.current > state.peak {
            state.peak = state.current;
        }
        let user = state.per_user.entry(user_id.to_string()).or_default();
        user.current += 1;
        if user.current > user.peak {
            user.peak = user.current;
        }
    }

    /// Mark one request completed for `user_id`. Calling `end` without a
    /// matching `begin` is a caller bug and panics in debug builds.
    pub fn end(&self, user_id: &str) {
        let mut state = self.state.lock().expect("concurrency tracker poisoned");
        debug_assert!(state.current > 0, "end() without matching begin()");
        state.current = state.current.saturating_sub(1);
        if let Some(user) = state.per_user.get_mut(user_id) {
            debug_assert!(
                user.current > 0,
                "end() without matching begin() for user {user_id}"
            );
            user.current = user.current.saturating_sub(1);
        }
    }

    pub fn snapshot(&self) -> ConcurrencySnapshot {
        self.state
            .lock()
            .expect("concurrency tracker poisoned")
            .clone()
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_paired_calls_return_to_zero() {
        let tracker = ConcurrencyTracker::new();
        tracker.begin("u1");
        tracker.begin("u1");
        tracker.begin("u2");
        tracker.end("u1");
        tracker.end("u2");
        tracker.end("u1");

        let snap = tracker.snapshot();
        assert_eq!(snap.current, 0);
        assert_eq!(snap.per_user["u1"].current, 0);
        assert_eq!(snap.per_user["u2"].current, 0);
    }

    #[test]
    fn test_peak_tracks_maximum() {
        let tracker = ConcurrencyTracker::new();
        tracker.begin("u1");
        tracker.begin("u1");
        tracker.end("u1");
        tracker.begin("u1");

        let snap = tracker.snapshot();
        assert_eq!(snap.current, 2);
        assert_eq!(snap.peak, 2);
        assert_eq!(snap.per_user["u1"].peak, 2);
    }

    #[test]
    fn test_peak_is_monotone_and_at_least_current() {
        let tracker = ConcurrencyTracker::new();
        for _ in 0..5 {
            tracker.begin("u1");
        }
        let peak_before = tracker.snapshot().peak;
        for _ in 0..5 {
            tracker.end("u1");
        }
        let snap = tracker.snapshot();
        assert_eq!(snap.peak, peak_before);
        assert!(snap.peak >= snap.current);
    }

    #[test]
    fn test_global_equals_sum_of_users() {
        let tracker = ConcurrencyTracker::new();
        tracker.begin("a");
        tracker.begin("b");
        tracker.begin("b");

        let snap = tracker.snapshot();
        let sum: u64 = snap.per_user.values().map(|u| u.current).sum();
        assert_eq!(snap.current, sum);
    }

    #[test]
    fn test_concurrent_begin_end_pairs() {
        let tracker = Arc::new(ConcurrencyTracker::new());
        let mut handles = Vec::new();
        for t in 0..100 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                let user = format!("user-{}", t % 8);
                for _ in 0..50 {
                    tracker.begin(&user);
                    tracker.end(&user);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = tracker.snapshot();
        assert_eq!(snap.current, 0);
        assert!(snap.peak >= 1);
        assert!(snap.peak <= 100);
        for user in snap.per_user.values() {
            assert_eq!(user.current, 0);
        }
    }
}
