//! Persistence collaborator contract.
//!
//! The core reads and writes entities only through [`AuthStore`]; backends
//! are external (a host crate implements this over its own pool). Mutating
//! methods that feed security decisions are specified as single atomic
//! read-modify-writes so concurrent operations on the same principal or
//! token never lose updates.

mod memory;

pub use memory::MemoryStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Principal, SingleUseRecord};

pub trait AuthStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backend fails.
    fn principal_by_id(&self, id: &str) -> Result<Option<Principal>>;

    /// Look up a principal by a unique claim value (e.g. `email`).
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn principal_by_claim(&self, claim: &str, value: &str) -> Result<Option<Principal>>;

    /// Atomically increment the OTP counter, returning the new value.
    /// The counter never decreases.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the principal is unknown.
    fn increment_otp_counter(&self, id: &str) -> Result<u64>;

    /// Atomically increment the OTP counter if and only if it currently
    /// equals `expected`. Returns `true` when this call advanced the
    /// counter; concurrent attempts against the same value see `false`.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the principal is unknown.
    fn increment_otp_counter_if_equals(&self, id: &str, expected: u64) -> Result<bool>;

    /// Atomically increment the failed-attempt count, returning the new value.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the principal is unknown.
    fn increment_failed_attempts(&self, id: &str) -> Result<u32>;

    /// # Errors
    /// Returns an error if the backend fails or the principal is unknown.
    fn set_locked_until(&self, id: &str, until: Option<DateTime<Utc>>) -> Result<()>;

    /// Atomically zero the failed-attempt count and clear the lock.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the principal is unknown.
    fn reset_failed_attempts(&self, id: &str) -> Result<()>;

    /// # Errors
    /// Returns an error if the backend fails or the token string collides.
    fn insert_single_use(&self, record: &SingleUseRecord) -> Result<()>;

    /// # Errors
    /// Returns an error if the backend fails.
    fn single_use_by_token(&self, token: &str) -> Result<Option<SingleUseRecord>>;

    /// Atomically set `consumed_at` if and only if it is unset. Returns
    /// `true` when this call performed the consumption; concurrent attempts
    /// on the same token see `false`.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the token is unknown.
    fn mark_consumed(&self, token: &str, at: DateTime<Utc>) -> Result<bool>;

    /// # Errors
    /// Returns an error if the backend fails.
    fn insert_revocation(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// # Errors
    /// Returns an error if the backend fails.
    fn revocation_exists(&self, jti: &str) -> Result<bool>;

    /// Delete all revocation entries whose expiry is before `before`,
    /// returning how many were removed. Idempotent.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn delete_expired_revocations(&self, before: DateTime<Utc>) -> Result<u64>;
}
