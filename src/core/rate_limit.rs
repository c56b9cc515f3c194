//! Sliding-window admission control keyed by action name.
//!
//! Every admitted request leaves a millisecond timestamp under its key. A
//! check drops timestamps older than the window and admits the request only
//! while fewer than `max_requests` remain. The window slides with the clock
//! instead of resetting on fixed boundaries.
//!
//! The timestamp map lives behind one mutex per limiter, so a check-and-admit
//! on any key cannot interleave with another. Separate limiters share nothing
//! and nothing is persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Source of "now" in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a host (or a test) can keep one handle and
/// give another to the limiter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A named limit: at most `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub max_requests: usize,
    pub window_ms: u64,
}

impl RateLimitRule {
    pub const fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Human-readable window length: whole seconds when exact, else millis.
    pub fn window_label(&self) -> String {
        match self.window_ms {
            1000 => "second".to_string(),
            ms if ms > 0 && ms % 1000 == 0 => format!("{} seconds", ms / 1000),
            ms => format!("{ms} ms"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RateLimiter<C: Clock = SystemClock> {
    clock: C,
    windows: Mutex<HashMap<String, Vec<i64>>>,
}

impl RateLimiter<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // The map stays consistent even if a holder panicked mid-check.
    fn windows(&self) -> MutexGuard<'_, HashMap<String, Vec<i64>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit one request for `key` if fewer than `max_requests` were admitted
    /// within the trailing `window`. A denied request is not recorded.
    pub fn is_allowed(&self, key: &str, max_requests: usize, window: Duration) -> bool {
        let now = self.clock.now_millis();
        let window_ms = window_millis(window);
        let mut windows = self.windows();

        // A denial leaves the stored history untouched.
        let mut recent: Vec<i64> = windows
            .get(key)
            .map(|timestamps| {
                timestamps
                    .iter()
                    .copied()
                    .filter(|&at| in_window(now, at, window_ms))
                    .collect()
            })
            .unwrap_or_default();

        if recent.len() >= max_requests {
            debug!(key, max_requests, window_ms, "rate limit reached");
            return false;
        }

        recent.push(now);
        windows.insert(key.to_string(), recent);
        true
    }

    /// Requests still available to `key` in the current window. Read-only.
    pub fn remaining(&self, key: &str, max_requests: usize, window: Duration) -> usize {
        let now = self.clock.now_millis();
        let window_ms = window_millis(window);
        let windows = self.windows();

        let used = windows
            .get(key)
            .map(|timestamps| {
                timestamps
                    .iter()
                    .filter(|&&at| in_window(now, at, window_ms))
                    .count()
            })
            .unwrap_or(0);
        max_requests.saturating_sub(used)
    }

    pub fn check(&self, key: &str, rule: &RateLimitRule) -> bool {
        self.is_allowed(key, rule.max_requests, rule.window())
    }

    pub fn remaining_for(&self, key: &str, rule: &RateLimitRule) -> usize {
        self.remaining(key, rule.max_requests, rule.window())
    }
}

fn window_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

fn in_window(now: i64, at: i64, window_ms: i64) -> bool {
    now.saturating_sub(at) < window_ms
}
