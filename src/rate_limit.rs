//! Fixed-window rate limiting for credential entry points.
//!
//! The window opens on the first request for a key and closes a fixed
//! duration later; counts never slide. A request at the boundary of an
//! expired window opens a fresh one. Checking and incrementing are a
//! single operation so concurrent callers cannot both slip under the
//! limit.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use crate::clock::Clock;

/// Map size past which expired windows for other keys are swept.
const SWEEP_THRESHOLD: usize = 1024;

/// Maximum requests allowed per window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateQuota {
    pub limit: u32,
    pub window_seconds: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited,
}

impl RateDecision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Counting strategy behind the credential entry points. Implementations
/// must make check-and-increment atomic per key.
pub trait RateLimiter: Send + Sync {
    fn check_and_increment(&self, key: &str, quota: RateQuota) -> RateDecision;
}

struct Window {
    count: u32,
    expires_at: DateTime<Utc>,
}

/// In-memory fixed-window limiter. The requested key's expired window is
/// reset in place; expired windows for other keys are swept only once the
/// map grows past a threshold, keeping the common path to one lookup.
pub struct FixedWindowLimiter {
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check_and_increment(&self, key: &str, quota: RateQuota) -> RateDecision {
        let now = self.clock.now();
        // The guarded data is plain counters; a panicking holder leaves
        // them usable, so poisoning is ignored rather than propagated.
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, window| window.expires_at > now);
        }

        let window = windows.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            expires_at: now + Duration::seconds(quota.window_seconds),
        });
        if window.expires_at <= now {
            *window = Window {
                count: 0,
                expires_at: now + Duration::seconds(quota.window_seconds),
            };
        }

        if window.count >= quota.limit {
            warn!(key, limit = quota.limit, "rate limit exceeded");
            return RateDecision::Limited;
        }
        window.count += 1;
        RateDecision::Allowed
    }
}

/// Limiter that allows everything. For hosts that gate requests upstream.
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_and_increment(&self, _key: &str, _quota: RateQuota) -> RateDecision {
        RateDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::{FixedWindowLimiter, NoopRateLimiter, RateDecision, RateLimiter, RateQuota};
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    const QUOTA: RateQuota = RateQuota {
        limit: 3,
        window_seconds: 60,
    };

    fn setup() -> (Arc<ManualClock>, FixedWindowLimiter) {
        let start = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        let clock = Arc::new(ManualClock::new(start));
        let limiter = FixedWindowLimiter::new(Arc::clone(&clock) as Arc<dyn crate::clock::Clock>);
        (clock, limiter)
    }

    #[test]
    fn denies_after_limit_within_window() {
        let (_clock, limiter) = setup();
        for _ in 0..3 {
            assert_eq!(limiter.check_and_increment("k", QUOTA), RateDecision::Allowed);
        }
        assert_eq!(limiter.check_and_increment("k", QUOTA), RateDecision::Limited);
    }

    #[test]
    fn window_resets_after_expiry() {
        let (clock, limiter) = setup();
        for _ in 0..3 {
            limiter.check_and_increment("k", QUOTA);
        }
        assert_eq!(limiter.check_and_increment("k", QUOTA), RateDecision::Limited);

        clock.advance(Duration::seconds(61));
        assert_eq!(limiter.check_and_increment("k", QUOTA), RateDecision::Allowed);
    }

    #[test]
    fn keys_are_independent() {
        let (_clock, limiter) = setup();
        for _ in 0..3 {
            limiter.check_and_increment("a", QUOTA);
        }
        assert_eq!(limiter.check_and_increment("a", QUOTA), RateDecision::Limited);
        assert_eq!(limiter.check_and_increment("b", QUOTA), RateDecision::Allowed);
    }

    #[test]
    fn window_opens_on_first_request_not_first_denial() {
        let (clock, limiter) = setup();
        limiter.check_and_increment("k", QUOTA);
        clock.advance(Duration::seconds(30));
        for _ in 0..2 {
            limiter.check_and_increment("k", QUOTA);
        }
        assert_eq!(limiter.check_and_increment("k", QUOTA), RateDecision::Limited);

        // 31 more seconds puts us past the window opened by the first call.
        clock.advance(Duration::seconds(31));
        assert_eq!(limiter.check_and_increment("k", QUOTA), RateDecision::Allowed);
    }

    #[test]
    fn expired_windows_are_swept_once_the_map_grows() {
        let (clock, limiter) = setup();
        let quota = RateQuota {
            limit: 1,
            window_seconds: 1,
        };
        for i in 0..1024 {
            limiter.check_and_increment(&format!("k{i}"), quota);
        }
        assert_eq!(limiter.tracked_keys(), 1024);

        clock.advance(Duration::seconds(2));
        limiter.check_and_increment("fresh", quota);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn noop_limiter_always_allows() {
        let limiter = NoopRateLimiter;
        for _ in 0..100 {
            assert!(limiter.check_and_increment("k", QUOTA).is_allowed());
        }
    }
}
