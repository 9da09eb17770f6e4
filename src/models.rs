//! Entities handled by the core: principals and single-use tokens.
//!
//! Principals are created by an external collaborator before any core
//! operation runs; the constructor here sets the OTP secret and counter
//! exactly once, with no implicit initialization hooks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::Error;

/// Byte length of generated OTP secrets (256 bits).
pub const OTP_SECRET_LEN: usize = 32;

/// The authenticating entity.
#[derive(Clone)]
pub struct Principal {
    pub id: String,
    /// Opaque secret shared with the principal's authenticator. Non-empty
    /// once persisted; never rotated implicitly.
    pub otp_secret: Vec<u8>,
    /// Monotonic HOTP counter; never decreases.
    pub otp_counter: u64,
    pub failed_attempts: u32,
    /// Unset means unlocked. Evaluated lazily against the clock.
    pub locked_until: Option<DateTime<Utc>>,
    /// Unique claim values (e.g. "email") used for claim-based resolution.
    pub claims: HashMap<String, String>,
}

impl Principal {
    /// Creates a principal with its secret set exactly once.
    ///
    /// # Errors
    /// Returns [`Error::MissingSecret`] if `otp_secret` is empty.
    pub fn new(id: impl Into<String>, otp_secret: Vec<u8>) -> Result<Self, Error> {
        if otp_secret.is_empty() {
            return Err(Error::MissingSecret);
        }
        Ok(Self {
            id: id.into(),
            otp_secret,
            otp_counter: 0,
            failed_attempts: 0,
            locked_until: None,
            claims: HashMap::new(),
        })
    }

    /// Attach a unique claim value usable with claim-based token resolution.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}

// Hand-written so the OTP secret never lands in logs.
impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("otp_secret", &"[redacted]")
            .field("otp_counter", &self.otp_counter)
            .field("failed_attempts", &self.failed_attempts)
            .field("locked_until", &self.locked_until)
            .field("claims", &self.claims)
            .finish()
    }
}

/// Generate a fresh 256-bit OTP secret.
///
/// # Errors
/// Returns an error if the system randomness source fails.
pub fn generate_otp_secret() -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; OTP_SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate otp secret")?;
    Ok(bytes)
}

/// Intended use of a single-use token. Both kinds share one state machine;
/// the kind only selects lifetime defaults and downstream issuance behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleUseKind {
    MagicLink,
    RefreshToken,
}

impl SingleUseKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MagicLink => "magic_link",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// A single-use token: magic link or refresh token.
#[derive(Debug, Clone)]
pub struct SingleUseRecord {
    pub id: Uuid,
    pub principal_id: String,
    /// Opaque random token string; unique and immutable after creation.
    pub token: String,
    pub kind: SingleUseKind,
    pub created_at: DateTime<Utc>,
    /// Set at creation, never extended.
    pub expires_at: DateTime<Utc>,
    /// Terminal marker ("used at" for magic links, "revoked at" for refresh
    /// tokens). Once set, never cleared.
    pub consumed_at: Option<DateTime<Utc>>,
}
