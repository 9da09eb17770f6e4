//! Single-use tokens: magic links and rotating refresh tokens.
//!
//! Both kinds share one record shape and one consumption path. A token is
//! created active, expires at a fixed instant, and is consumed at most
//! once; consumption is a compare-and-set at the store so concurrent
//! presenters cannot both win.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Duration;
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::Error;
use crate::models::{SingleUseKind, SingleUseRecord};
use crate::store::AuthStore;

/// Byte length of generated token material (256 bits before encoding).
const TOKEN_LEN: usize = 32;

pub struct SingleUseTokens {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    magic_link_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl SingleUseTokens {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, config: &AuthConfig) -> Self {
        Self {
            store,
            clock,
            magic_link_lifetime: Duration::seconds(config.magic_link_lifetime_seconds()),
            refresh_lifetime: Duration::seconds(config.refresh_lifetime_seconds()),
        }
    }

    /// Mint a fresh token of the given kind for the principal. The lifetime
    /// comes from configuration per kind and is fixed at creation.
    ///
    /// # Errors
    /// Returns `Store` on collaborator failure, including the (vanishingly
    /// unlikely) token collision.
    pub fn create(
        &self,
        principal_id: &str,
        kind: SingleUseKind,
    ) -> Result<SingleUseRecord, Error> {
        let now = self.clock.now();
        let lifetime = match kind {
            SingleUseKind::MagicLink => self.magic_link_lifetime,
            SingleUseKind::RefreshToken => self.refresh_lifetime,
        };
        let record = SingleUseRecord {
            id: Uuid::new_v4(),
            principal_id: principal_id.to_string(),
            token: generate_token()?,
            kind,
            created_at: now,
            expires_at: now + lifetime,
            consumed_at: None,
        };
        self.store.insert_single_use(&record)?;
        debug!(
            principal = %principal_id,
            kind = kind.as_str(),
            expires_at = %record.expires_at,
            "single-use token created"
        );
        Ok(record)
    }

    /// Fetch a token's record if it is still active: known, of the expected
    /// kind, unconsumed, and unexpired. Read-only; never consumes.
    ///
    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn lookup_active(
        &self,
        token: &str,
        expected_kind: SingleUseKind,
    ) -> Result<Option<SingleUseRecord>, Error> {
        let Some(record) = self.store.single_use_by_token(token)? else {
            return Ok(None);
        };
        let active = record.kind == expected_kind
            && record.consumed_at.is_none()
            && record.expires_at > self.clock.now();
        Ok(active.then_some(record))
    }

    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn is_active(&self, token: &str, expected_kind: SingleUseKind) -> Result<bool, Error> {
        Ok(self.lookup_active(token, expected_kind)?.is_some())
    }

    /// Consume a token: it must exist, be of the expected kind, be
    /// unconsumed, and be unexpired, in that order of checking. Exactly one
    /// concurrent presenter succeeds.
    ///
    /// # Errors
    /// `NotFound` for unknown tokens or a kind mismatch, `AlreadyConsumed`
    /// for a second presentation, `Expired` past the token's lifetime, or
    /// `Store` on collaborator failure.
    pub fn consume(
        &self,
        token: &str,
        expected_kind: SingleUseKind,
    ) -> Result<SingleUseRecord, Error> {
        let record = self
            .store
            .single_use_by_token(token)?
            .ok_or(Error::NotFound)?;
        // A token of the wrong kind is indistinguishable from an unknown one
        // to the caller.
        if record.kind != expected_kind {
            return Err(Error::NotFound);
        }
        if record.consumed_at.is_some() {
            return Err(Error::AlreadyConsumed);
        }
        let now = self.clock.now();
        if record.expires_at <= now {
            return Err(Error::Expired);
        }

        if !self.store.mark_consumed(token, now)? {
            // Lost the race to a concurrent presenter.
            return Err(Error::AlreadyConsumed);
        }
        debug!(
            principal = %record.principal_id,
            kind = record.kind.as_str(),
            "single-use token consumed"
        );
        Ok(SingleUseRecord {
            consumed_at: Some(now),
            ..record
        })
    }
}

fn generate_token() -> Result<String, Error> {
    let mut bytes = [0u8; TOKEN_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| Error::Store(anyhow::anyhow!("randomness source failed: {err}")))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}
