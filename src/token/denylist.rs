//! Revoked-token denylist with expiry-based garbage collection.
//!
//! Entries are keyed by the token's `jti` claim and carry the token's
//! original expiry. Cleanup is invoked explicitly by the host on its own
//! schedule; it never blocks lookups, and a lookup racing a cleanup at the
//! expiry boundary may see either answer; both mean the token is no
//! longer valid anyway.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::error::Error;
use crate::store::AuthStore;

#[derive(Clone)]
pub struct Denylist {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl Denylist {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn add(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        self.store.insert_revocation(jti, expires_at)?;
        Ok(())
    }

    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn contains(&self, jti: &str) -> Result<bool, Error> {
        Ok(self.store.revocation_exists(jti)?)
    }

    /// Remove entries whose expiry has passed, returning how many were
    /// deleted. Safe to run repeatedly and concurrently with lookups.
    ///
    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn cleanup_expired(&self) -> Result<u64, Error> {
        let removed = self.store.delete_expired_revocations(self.clock.now())?;
        if removed > 0 {
            debug!(removed, "purged expired revocation entries");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::Denylist;
    use crate::clock::{Clock, ManualClock};
    use crate::error::Error;
    use crate::store::{AuthStore, MemoryStore};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, Denylist) {
        let store = Arc::new(MemoryStore::new());
        let start = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        let clock = Arc::new(ManualClock::new(start));
        let denylist = Denylist::new(
            store as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (clock, denylist)
    }

    #[test]
    fn entries_persist_until_cleanup_after_expiry() -> Result<(), Error> {
        let (clock, denylist) = setup();
        denylist.add("jti-1", clock.now() + Duration::minutes(5))?;
        assert!(denylist.contains("jti-1")?);

        // Not expired yet: cleanup keeps it.
        assert_eq!(denylist.cleanup_expired()?, 0);
        assert!(denylist.contains("jti-1")?);

        clock.advance(Duration::minutes(6));
        assert_eq!(denylist.cleanup_expired()?, 1);
        assert!(!denylist.contains("jti-1")?);
        Ok(())
    }

    #[test]
    fn cleanup_is_idempotent() -> Result<(), Error> {
        let (clock, denylist) = setup();
        denylist.add("jti-1", clock.now() - Duration::minutes(1))?;
        assert_eq!(denylist.cleanup_expired()?, 1);
        assert_eq!(denylist.cleanup_expired()?, 0);
        Ok(())
    }
}
