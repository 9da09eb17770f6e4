//! The public credential lifecycle facade.
//!
//! `AuthService` wires the proof mechanisms, lockout tracking, rate
//! limiting, bearer-token issuance, and delivery into the entry points a
//! host calls. Every request-shaped entry point is gated on two rate-limit
//! keys: one for the requester (e.g. a client address) and one for the
//! target (principal id or presented token), so neither a single origin
//! nor a single account can be hammered from many origins.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::delivery::Delivery;
use crate::error::Error;
use crate::lockout::LockoutTracker;
use crate::models::{Principal, SingleUseKind};
use crate::otp::OtpService;
use crate::rate_limit::{RateLimiter, RateQuota};
use crate::single_use::SingleUseTokens;
use crate::store::AuthStore;
use crate::token::{Denylist, Signer, TokenService};

/// Bearer token plus the refresh token that can later renew it.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub bearer: String,
    pub refresh: String,
}

pub struct AuthService {
    store: Arc<dyn AuthStore>,
    limiter: Arc<dyn RateLimiter>,
    delivery: Arc<dyn Delivery>,
    otp: OtpService,
    lockout: LockoutTracker,
    tokens: TokenService,
    single_use: SingleUseTokens,
    denylist: Denylist,
    config: AuthConfig,
}

impl AuthService {
    /// # Errors
    /// Returns [`Error::InsecureAlgorithm`] for an unsigned signer without
    /// the explicit configuration opt-in.
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        signer: Signer,
        limiter: Arc<dyn RateLimiter>,
        delivery: Arc<dyn Delivery>,
        config: AuthConfig,
    ) -> Result<Self, Error> {
        let lockout = LockoutTracker::new(Arc::clone(&store), Arc::clone(&clock), &config);
        let otp = OtpService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            lockout.clone(),
            &config,
        );
        let denylist = Denylist::new(Arc::clone(&store), Arc::clone(&clock));
        let tokens = TokenService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            signer,
            denylist.clone(),
            &config,
        )?;
        let single_use = SingleUseTokens::new(Arc::clone(&store), clock, &config);
        Ok(Self {
            store,
            limiter,
            delivery,
            otp,
            lockout,
            tokens,
            single_use,
            denylist,
            config,
        })
    }

    /// Generate a passcode for the principal and hand it to the delivery
    /// collaborator. Delivery failures are logged, never surfaced, so an
    /// outbound outage cannot be used to probe for valid principal ids.
    ///
    /// # Errors
    /// `RateLimited`, `NotFound`, `MissingSecret`, or `Store`.
    pub fn request_otp(&self, requester: &str, principal_id: &str) -> Result<(), Error> {
        self.gate(
            "request_otp",
            self.config.request_otp_quota(),
            requester,
            principal_id,
        )?;
        let code = self.otp.generate(principal_id)?;
        self.deliver(principal_id, &code)?;
        Ok(())
    }

    /// Verify a passcode and exchange it for a signed bearer token.
    ///
    /// # Errors
    /// `RateLimited`, `AccountLocked`, `InvalidCode`, `MissingSecret`,
    /// `NotFound`, or `Store`.
    pub fn verify_otp(
        &self,
        requester: &str,
        principal_id: &str,
        code: &str,
    ) -> Result<String, Error> {
        self.gate(
            "verify_otp",
            self.config.verify_otp_quota(),
            requester,
            principal_id,
        )?;
        self.otp.verify(principal_id, code)?;
        let principal = self
            .store
            .principal_by_id(principal_id)?
            .ok_or(Error::NotFound)?;
        self.issue_bearer(&principal)
    }

    /// Mint a magic-link token for the principal and hand it to the
    /// delivery collaborator.
    ///
    /// # Errors
    /// `RateLimited`, `NotFound`, or `Store`.
    pub fn request_magic_link(&self, requester: &str, principal_id: &str) -> Result<(), Error> {
        self.gate(
            "request_magic_link",
            self.config.request_magic_link_quota(),
            requester,
            principal_id,
        )?;
        if self.store.principal_by_id(principal_id)?.is_none() {
            return Err(Error::NotFound);
        }
        let record = self.single_use.create(principal_id, SingleUseKind::MagicLink)?;
        self.deliver(principal_id, &record.token)?;
        Ok(())
    }

    /// Redeem a magic-link token for a bearer token and a refresh token.
    ///
    /// The owner's lockout state is checked before the link is consumed, so
    /// a locked account does not silently burn its outstanding links.
    /// Successful redemption counts as a proof and resets the failure
    /// counter.
    ///
    /// # Errors
    /// `RateLimited`, `NotFound`, `AccountLocked`, `AlreadyConsumed`,
    /// `Expired`, or `Store`.
    pub fn verify_magic_link(&self, requester: &str, token: &str) -> Result<SessionTokens, Error> {
        self.gate(
            "verify_magic_link",
            self.config.verify_magic_link_quota(),
            requester,
            token,
        )?;
        let record = self
            .single_use
            .lookup_active(token, SingleUseKind::MagicLink)?;
        if let Some(record) = &record {
            let principal = self
                .store
                .principal_by_id(&record.principal_id)?
                .ok_or(Error::NotFound)?;
            if self.lockout.is_locked(&principal) {
                warn!(
                    principal = %principal.id,
                    "magic link refused: account locked"
                );
                return Err(Error::AccountLocked);
            }
        }

        let record = self.single_use.consume(token, SingleUseKind::MagicLink)?;
        let principal = self
            .store
            .principal_by_id(&record.principal_id)?
            .ok_or(Error::NotFound)?;
        self.lockout.record_success(&principal.id)?;
        self.session_for(&principal)
    }

    /// Rotate a refresh token: consume the presented one and return a new
    /// bearer token plus a replacement refresh token. A consumed refresh
    /// token is never accepted again.
    ///
    /// # Errors
    /// `RateLimited`, `NotFound`, `AlreadyConsumed`, `Expired`, or `Store`.
    pub fn refresh(&self, requester: &str, token: &str) -> Result<SessionTokens, Error> {
        self.gate("refresh", self.config.refresh_quota(), requester, token)?;
        let record = self
            .single_use
            .consume(token, SingleUseKind::RefreshToken)?;
        let principal = self
            .store
            .principal_by_id(&record.principal_id)?
            .ok_or(Error::NotFound)?;
        self.session_for(&principal)
    }

    /// Revoke a bearer token. Accepts expired tokens so stale sessions can
    /// still be signed out; the signature is always checked, which is why
    /// this entry point carries no rate gate of its own.
    ///
    /// # Errors
    /// `Malformed`, `BadSignature`, `MissingJti`, or `Store`.
    pub fn sign_out(&self, bearer: &str) -> Result<(), Error> {
        self.tokens.revoke(bearer)
    }

    /// Revocation-aware resolution of a bearer token to its principal.
    ///
    /// # Errors
    /// See [`TokenService::resolve_claim`].
    pub fn resolve(&self, bearer: &str) -> Result<Principal, Error> {
        self.tokens.resolve(bearer)
    }

    /// Resolve by an arbitrary unique claim instead of `sub`.
    ///
    /// # Errors
    /// See [`TokenService::resolve_claim`].
    pub fn resolve_claim(&self, bearer: &str, claim_name: &str) -> Result<Principal, Error> {
        self.tokens.resolve_claim(bearer, claim_name)
    }

    /// Purge revocation entries whose tokens have expired anyway. Intended
    /// to be called from the host's periodic task runner.
    ///
    /// # Errors
    /// Returns `Store` on collaborator failure.
    pub fn cleanup_expired_revocations(&self) -> Result<u64, Error> {
        self.denylist.cleanup_expired()
    }

    fn session_for(&self, principal: &Principal) -> Result<SessionTokens, Error> {
        let bearer = self.issue_bearer(principal)?;
        let refresh = self
            .single_use
            .create(&principal.id, SingleUseKind::RefreshToken)?;
        Ok(SessionTokens {
            bearer,
            refresh: refresh.token,
        })
    }

    fn issue_bearer(&self, principal: &Principal) -> Result<String, Error> {
        // The principal's claim map rides along in the token so hosts can
        // resolve by claims without a store round trip on every request.
        let mut extra = serde_json::Map::new();
        for (name, value) in &principal.claims {
            extra.insert(name.clone(), serde_json::Value::String(value.clone()));
        }
        self.tokens.issue(&principal.id, extra)
    }

    fn gate(
        &self,
        entry: &str,
        quota: RateQuota,
        requester: &str,
        target: &str,
    ) -> Result<(), Error> {
        let requester_key = format!("{entry}:requester:{requester}");
        let target_key = format!("{entry}:target:{target}");
        if !self
            .limiter
            .check_and_increment(&requester_key, quota)
            .is_allowed()
            || !self
                .limiter
                .check_and_increment(&target_key, quota)
                .is_allowed()
        {
            return Err(Error::RateLimited);
        }
        Ok(())
    }

    fn deliver(&self, principal_id: &str, value: &str) -> Result<(), Error> {
        let principal = self
            .store
            .principal_by_id(principal_id)?
            .ok_or(Error::NotFound)?;
        if let Err(err) = self.delivery.deliver(&principal, value) {
            warn!(principal = %principal_id, %err, "delivery failed");
        } else {
            debug!(principal = %principal_id, "credential delivered");
        }
        Ok(())
    }
}
