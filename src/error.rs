//! Structured error kinds for every verification and issuance path.
//!
//! The core never formats user-visible text; callers map these kinds onto
//! whatever uniform external responses they need (for example conflating
//! `NotFound` and `InvalidCode` to resist account enumeration).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid one-time code")]
    InvalidCode,
    #[error("expired")]
    Expired,
    #[error("account locked")]
    AccountLocked,
    #[error("no otp secret configured")]
    MissingSecret,
    #[error("invalid signature")]
    BadSignature,
    #[error("malformed token")]
    Malformed,
    #[error("missing jti claim")]
    MissingJti,
    #[error("token revoked")]
    Revoked,
    #[error("not found")]
    NotFound,
    #[error("already consumed")]
    AlreadyConsumed,
    #[error("rate limited")]
    RateLimited,
    #[error("unsigned tokens require explicit opt-in")]
    InsecureAlgorithm,
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl Error {
    /// True for the tampering/misconfiguration class of failures, which
    /// callers should log distinctly from ordinary auth failures.
    #[must_use]
    pub fn is_tampering(&self) -> bool {
        matches!(self, Self::BadSignature | Self::Malformed)
    }

    /// True when the caller can recover by retrying, re-requesting a code,
    /// or waiting out a lockout or rate-limit window.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::BadSignature | Self::Malformed | Self::Store(_))
    }
}
