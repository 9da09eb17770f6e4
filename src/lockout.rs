//! Failed-attempt tracking and time-windowed account lockout.
//!
//! A principal moves Unlocked -> Locked when consecutive failures reach the
//! configured maximum, and back to Unlocked once the lockout duration
//! elapses. The transition back is evaluated lazily on read; nothing is
//! stored when a lock expires. Locking only blocks the proof-verification
//! paths that consult this tracker, never unrelated data access.

use chrono::Duration;
use std::sync::Arc;
use tracing::warn;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::Error;
use crate::models::Principal;
use crate::store::AuthStore;

#[derive(Clone)]
pub struct LockoutTracker {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    lockout: Duration,
}

impl LockoutTracker {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, config: &AuthConfig) -> Self {
        Self {
            store,
            clock,
            max_attempts: config.max_failed_attempts(),
            lockout: Duration::seconds(config.lockout_seconds()),
        }
    }

    /// True iff the principal's lock timestamp is still in the future.
    #[must_use]
    pub fn is_locked(&self, principal: &Principal) -> bool {
        principal
            .locked_until
            .is_some_and(|until| until > self.clock.now())
    }

    /// Record a failed proof attempt; locks the account when the shared
    /// counter reaches the configured maximum.
    ///
    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn record_failure(&self, principal_id: &str) -> Result<(), Error> {
        let attempts = self.store.increment_failed_attempts(principal_id)?;
        if attempts >= self.max_attempts {
            let until = self.clock.now() + self.lockout;
            self.store.set_locked_until(principal_id, Some(until))?;
            warn!(
                principal = %principal_id,
                attempts,
                locked_until = %until,
                "account locked after repeated failures"
            );
        }
        Ok(())
    }

    /// Record a successful proof: zero the counter and clear any lock.
    ///
    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn record_success(&self, principal_id: &str) -> Result<(), Error> {
        self.store.reset_failed_attempts(principal_id)?;
        Ok(())
    }
}
