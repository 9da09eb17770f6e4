//! Bearer-token issuance, verification, resolution, and revocation.

use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::denylist::Denylist;
use super::jwt::{self, Claims, Signer};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::Error;
use crate::models::Principal;
use crate::store::AuthStore;

pub struct TokenService {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    signer: Signer,
    denylist: Denylist,
    lifetime_seconds: i64,
}

impl TokenService {
    /// # Errors
    /// Returns [`Error::InsecureAlgorithm`] when the signer is unsigned and
    /// configuration has not explicitly allowed unsigned tokens.
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        signer: Signer,
        denylist: Denylist,
        config: &AuthConfig,
    ) -> Result<Self, Error> {
        if matches!(signer, Signer::Unsigned) && !config.allow_unsigned_tokens() {
            return Err(Error::InsecureAlgorithm);
        }
        Ok(Self {
            store,
            clock,
            signer,
            denylist,
            lifetime_seconds: config.bearer_lifetime_seconds(),
        })
    }

    /// Issue a signed bearer token for `subject`. Mutates nothing; every
    /// issuance gets a fresh `jti`.
    ///
    /// # Errors
    /// Returns an error if claims cannot be encoded or signing fails.
    pub fn issue(
        &self,
        subject: &str,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, Error> {
        let now = self.clock.now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            jti: Some(Uuid::new_v4().to_string()),
            iat: now,
            exp: now + self.lifetime_seconds,
            extra,
        };
        jwt::sign(&self.signer, &claims)
    }

    /// Check signature and expiry and return the decoded claims. Does not
    /// consult the denylist; revocation-aware callers use [`Self::resolve`].
    ///
    /// # Errors
    /// `Malformed`, `BadSignature`, or `Expired`.
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        let result = jwt::decode(&self.signer, token, self.clock.now().timestamp(), true);
        if let Err(err) = &result {
            if err.is_tampering() {
                // Tampering-class failures are logged apart from ordinary
                // auth failures so operators can alert on them.
                error!(%err, "bearer token failed verification");
            }
        }
        result
    }

    /// Resolve a token to its principal via the `sub` claim.
    ///
    /// # Errors
    /// See [`Self::resolve_claim`].
    pub fn resolve(&self, token: &str) -> Result<Principal, Error> {
        self.resolve_claim(token, "sub")
    }

    /// Revocation-aware resolution: verify the token, require a `jti`
    /// (tokens without one cannot be revoked and are rejected outright),
    /// refuse denylisted tokens, then resolve the named claim to a
    /// principal. A lookup miss is `NotFound`, distinct from signature or
    /// expiry failures.
    ///
    /// # Errors
    /// `Malformed`, `BadSignature`, `Expired`, `MissingJti`, `Revoked`,
    /// `NotFound`, or `Store`.
    pub fn resolve_claim(&self, token: &str, claim_name: &str) -> Result<Principal, Error> {
        let claims = self.verify(token)?;
        let jti = claims.jti.as_deref().ok_or(Error::MissingJti)?;
        if self.denylist.contains(jti)? {
            debug!(jti, "refusing revoked bearer token");
            return Err(Error::Revoked);
        }

        let value = claims.claim(claim_name).ok_or(Error::NotFound)?;
        let principal = if claim_name == "sub" {
            self.store.principal_by_id(value)?
        } else {
            self.store.principal_by_claim(claim_name, value)?
        };
        principal.ok_or(Error::NotFound)
    }

    /// Revoke a token by denylisting its `jti` until the token's own
    /// expiry. Already-expired tokens are accepted so stale sessions can
    /// still be explicitly signed out; the signature is always checked.
    ///
    /// # Errors
    /// `Malformed`, `BadSignature`, `MissingJti`, or `Store`.
    pub fn revoke(&self, token: &str) -> Result<(), Error> {
        let claims = jwt::decode(&self.signer, token, self.clock.now().timestamp(), false)?;
        let jti = claims.jti.ok_or(Error::MissingJti)?;
        let expires_at =
            chrono::DateTime::from_timestamp(claims.exp, 0).ok_or(Error::Malformed)?;
        self.denylist.add(&jti, expires_at)?;
        debug!(%jti, "bearer token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, TokenService) {
        let store = Arc::new(MemoryStore::new());
        let start = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        let clock = Arc::new(ManualClock::new(start));
        let denylist = Denylist::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let service = TokenService::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Signer::hs256(*b"0123456789abcdef0123456789abcdef"),
            denylist,
            &AuthConfig::new(),
        )
        .expect("signed algorithm is always accepted");

        let principal = Principal::new("p1", vec![1, 2, 3])
            .expect("secret is non-empty")
            .with_claim("email", "a@example.com");
        store.insert_principal(principal);
        (store, clock, service)
    }

    #[test]
    fn issue_then_resolve_round_trips() -> Result<(), Error> {
        let (_store, _clock, service) = setup();
        let token = service.issue("p1", serde_json::Map::new())?;
        let principal = service.resolve(&token)?;
        assert_eq!(principal.id, "p1");
        Ok(())
    }

    #[test]
    fn resolve_by_extra_claim() -> Result<(), Error> {
        let (_store, _clock, service) = setup();
        let mut extra = serde_json::Map::new();
        extra.insert(
            "email".to_string(),
            serde_json::Value::String("a@example.com".to_string()),
        );
        let token = service.issue("p1", extra)?;
        let principal = service.resolve_claim(&token, "email")?;
        assert_eq!(principal.id, "p1");
        Ok(())
    }

    #[test]
    fn unknown_subject_is_not_found() -> Result<(), Error> {
        let (_store, _clock, service) = setup();
        let token = service.issue("ghost", serde_json::Map::new())?;
        assert!(matches!(service.resolve(&token), Err(Error::NotFound)));
        Ok(())
    }

    #[test]
    fn expired_token_is_expired_not_not_found() -> Result<(), Error> {
        let (_store, clock, service) = setup();
        let token = service.issue("p1", serde_json::Map::new())?;
        clock.advance(Duration::seconds(3601));
        assert!(matches!(service.resolve(&token), Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn revoke_then_resolve_is_revoked() -> Result<(), Error> {
        let (_store, _clock, service) = setup();
        let token = service.issue("p1", serde_json::Map::new())?;
        service.revoke(&token)?;
        assert!(matches!(service.resolve(&token), Err(Error::Revoked)));
        Ok(())
    }

    #[test]
    fn expired_tokens_can_still_be_revoked() -> Result<(), Error> {
        let (_store, clock, service) = setup();
        let token = service.issue("p1", serde_json::Map::new())?;
        clock.advance(Duration::seconds(7200));
        service.revoke(&token)?;
        Ok(())
    }

    #[test]
    fn token_without_jti_is_rejected_on_resolve_and_revoke() -> Result<(), Error> {
        let (store, clock, service) = setup();
        // Hand-sign claims without a jti; such tokens cannot be revoked and
        // must not resolve.
        let signer = Signer::hs256(*b"0123456789abcdef0123456789abcdef");
        let now = clock.now().timestamp();
        let claims = Claims {
            sub: "p1".to_string(),
            jti: None,
            iat: now,
            exp: now + 3600,
            extra: serde_json::Map::new(),
        };
        let token = jwt::sign(&signer, &claims)?;

        assert!(matches!(service.resolve(&token), Err(Error::MissingJti)));
        assert!(matches!(service.revoke(&token), Err(Error::MissingJti)));
        drop(store);
        Ok(())
    }

    #[test]
    fn unsigned_signer_requires_opt_in() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let denylist = Denylist::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let refused = TokenService::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Signer::unsigned(),
            denylist.clone(),
            &AuthConfig::new(),
        );
        assert!(matches!(refused, Err(Error::InsecureAlgorithm)));

        let allowed = TokenService::new(
            store as Arc<dyn AuthStore>,
            clock as Arc<dyn Clock>,
            Signer::unsigned(),
            denylist,
            &AuthConfig::new().with_allow_unsigned_tokens(true),
        );
        assert!(allowed.is_ok());
    }

    #[test]
    fn jti_is_unique_per_issuance() -> Result<(), Error> {
        let (_store, _clock, service) = setup();
        let first = service.verify(&service.issue("p1", serde_json::Map::new())?)?;
        let second = service.verify(&service.issue("p1", serde_json::Map::new())?)?;
        assert_ne!(first.jti, second.jti);
        Ok(())
    }
}
