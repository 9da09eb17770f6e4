//! In-process reference store.
//!
//! Backed by mutex-guarded maps; suitable for tests and single-process
//! hosts. Every trait method takes the relevant lock once, so the
//! read-modify-write contracts of [`AuthStore`] hold.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::AuthStore;
use crate::models::{Principal, SingleUseRecord};

#[derive(Debug, Default)]
pub struct MemoryStore {
    principals: Mutex<HashMap<String, Principal>>,
    single_use: Mutex<HashMap<String, SingleUseRecord>>,
    revocations: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal. Creation happens outside the core; this is the
    /// in-memory stand-in for whatever provisioning the host does.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn insert_principal(&self, principal: Principal) {
        let mut principals = self.principals.lock().expect("principals lock poisoned");
        principals.insert(principal.id.clone(), principal);
    }
}

fn lock_err() -> anyhow::Error {
    anyhow::anyhow!("store lock poisoned")
}

impl AuthStore for MemoryStore {
    fn principal_by_id(&self, id: &str) -> Result<Option<Principal>> {
        let principals = self.principals.lock().map_err(|_| lock_err())?;
        Ok(principals.get(id).cloned())
    }

    fn principal_by_claim(&self, claim: &str, value: &str) -> Result<Option<Principal>> {
        let principals = self.principals.lock().map_err(|_| lock_err())?;
        Ok(principals
            .values()
            .find(|p| p.claims.get(claim).is_some_and(|v| v == value))
            .cloned())
    }

    fn increment_otp_counter(&self, id: &str) -> Result<u64> {
        let mut principals = self.principals.lock().map_err(|_| lock_err())?;
        match principals.get_mut(id) {
            Some(principal) => {
                principal.otp_counter += 1;
                Ok(principal.otp_counter)
            }
            None => bail!("unknown principal: {id}"),
        }
    }

    fn increment_otp_counter_if_equals(&self, id: &str, expected: u64) -> Result<bool> {
        let mut principals = self.principals.lock().map_err(|_| lock_err())?;
        match principals.get_mut(id) {
            Some(principal) if principal.otp_counter == expected => {
                principal.otp_counter += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => bail!("unknown principal: {id}"),
        }
    }

    fn increment_failed_attempts(&self, id: &str) -> Result<u32> {
        let mut principals = self.principals.lock().map_err(|_| lock_err())?;
        match principals.get_mut(id) {
            Some(principal) => {
                principal.failed_attempts += 1;
                Ok(principal.failed_attempts)
            }
            None => bail!("unknown principal: {id}"),
        }
    }

    fn set_locked_until(&self, id: &str, until: Option<DateTime<Utc>>) -> Result<()> {
        let mut principals = self.principals.lock().map_err(|_| lock_err())?;
        match principals.get_mut(id) {
            Some(principal) => {
                principal.locked_until = until;
                Ok(())
            }
            None => bail!("unknown principal: {id}"),
        }
    }

    fn reset_failed_attempts(&self, id: &str) -> Result<()> {
        let mut principals = self.principals.lock().map_err(|_| lock_err())?;
        match principals.get_mut(id) {
            Some(principal) => {
                principal.failed_attempts = 0;
                principal.locked_until = None;
                Ok(())
            }
            None => bail!("unknown principal: {id}"),
        }
    }

    fn insert_single_use(&self, record: &SingleUseRecord) -> Result<()> {
        let mut tokens = self.single_use.lock().map_err(|_| lock_err())?;
        if tokens.contains_key(&record.token) {
            bail!("single-use token collision");
        }
        tokens.insert(record.token.clone(), record.clone());
        Ok(())
    }

    fn single_use_by_token(&self, token: &str) -> Result<Option<SingleUseRecord>> {
        let tokens = self.single_use.lock().map_err(|_| lock_err())?;
        Ok(tokens.get(token).cloned())
    }

    fn mark_consumed(&self, token: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.single_use.lock().map_err(|_| lock_err())?;
        match tokens.get_mut(token) {
            Some(record) if record.consumed_at.is_none() => {
                record.consumed_at = Some(at);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => bail!("unknown single-use token"),
        }
    }

    fn insert_revocation(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut revocations = self.revocations.lock().map_err(|_| lock_err())?;
        revocations.entry(jti.to_string()).or_insert(expires_at);
        Ok(())
    }

    fn revocation_exists(&self, jti: &str) -> Result<bool> {
        let revocations = self.revocations.lock().map_err(|_| lock_err())?;
        Ok(revocations.contains_key(jti))
    }

    fn delete_expired_revocations(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut revocations = self.revocations.lock().map_err(|_| lock_err())?;
        let initial = revocations.len();
        revocations.retain(|_, expires_at| *expires_at >= before);
        Ok((initial - revocations.len()) as u64)
    }
}
