//! OTP generation and verification against a principal's secret.

use std::sync::Arc;
use totp_rs::{Algorithm, TOTP};
use tracing::{debug, warn};

use super::{hotp, OtpMode};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::Error;
use crate::lockout::LockoutTracker;
use crate::models::Principal;
use crate::store::AuthStore;

pub struct OtpService {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    lockout: LockoutTracker,
    mode: OtpMode,
    digits: u32,
    step_seconds: u64,
    skew: u8,
}

impl OtpService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        lockout: LockoutTracker,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            clock,
            lockout,
            mode: config.otp_mode(),
            digits: config.otp_digits(),
            step_seconds: config.totp_step_seconds(),
            skew: config.totp_skew(),
        }
    }

    /// Generate a passcode for the principal.
    ///
    /// Counter mode increments the stored counter atomically and derives the
    /// code at the new value, so every generated code is distinct. Time mode
    /// derives from the current step without mutating any state.
    ///
    /// # Errors
    /// `NotFound` for an unknown principal, `MissingSecret` if no secret is
    /// set, or `Store` on collaborator failure.
    pub fn generate(&self, principal_id: &str) -> Result<String, Error> {
        let principal = self
            .store
            .principal_by_id(principal_id)?
            .ok_or(Error::NotFound)?;
        if principal.otp_secret.is_empty() {
            return Err(Error::MissingSecret);
        }

        match self.mode {
            OtpMode::Counter => {
                let counter = self.store.increment_otp_counter(principal_id)?;
                Ok(hotp(&principal.otp_secret, counter, self.digits))
            }
            OtpMode::Time => Ok(self.totp(&principal).generate(self.now_unix())),
        }
    }

    /// Verify a submitted passcode.
    ///
    /// Counter mode requires an exact match at the stored counter and moves
    /// the counter forward on success; time mode tolerates the configured
    /// skew. Failures are recorded against the shared lockout counter.
    ///
    /// # Errors
    /// `AccountLocked` while the principal is locked, `MissingSecret` if no
    /// secret is set, `InvalidCode` on mismatch, `NotFound` for an unknown
    /// principal, or `Store` on collaborator failure.
    pub fn verify(&self, principal_id: &str, code: &str) -> Result<(), Error> {
        let principal = self
            .store
            .principal_by_id(principal_id)?
            .ok_or(Error::NotFound)?;
        if self.lockout.is_locked(&principal) {
            warn!(principal = %principal_id, "otp verification refused: account locked");
            return Err(Error::AccountLocked);
        }
        if principal.otp_secret.is_empty() {
            return Err(Error::MissingSecret);
        }
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::InvalidCode);
        }

        let matched = match self.mode {
            OtpMode::Counter => {
                // Compare-and-advance in one store operation; of several
                // concurrent presentations of the same code, exactly one
                // advances the counter and wins.
                hotp(&principal.otp_secret, principal.otp_counter, self.digits).as_str() == code
                    && self
                        .store
                        .increment_otp_counter_if_equals(principal_id, principal.otp_counter)?
            }
            OtpMode::Time => self.totp(&principal).check(code, self.now_unix()),
        };

        if matched {
            self.lockout.record_success(principal_id)?;
            debug!(principal = %principal_id, "otp verified");
            Ok(())
        } else {
            self.lockout.record_failure(principal_id)?;
            Err(Error::InvalidCode)
        }
    }

    fn totp(&self, principal: &Principal) -> TOTP {
        TOTP::new_unchecked(
            Algorithm::SHA1,
            self.digits as usize,
            self.skew,
            self.step_seconds,
            principal.otp_secret.clone(),
        )
    }

    fn now_unix(&self) -> u64 {
        u64::try_from(self.clock.now().timestamp()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn setup(mode: OtpMode) -> (Arc<MemoryStore>, Arc<ManualClock>, OtpService) {
        let store = Arc::new(MemoryStore::new());
        let start = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        let clock = Arc::new(ManualClock::new(start));
        let config = AuthConfig::new().with_otp_mode(mode);
        let lockout = LockoutTracker::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            &config,
        );
        let service = OtpService::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            lockout,
            &config,
        );
        (store, clock, service)
    }

    fn insert_principal(store: &MemoryStore, id: &str) {
        let principal = Principal::new(id, b"12345678901234567890".to_vec())
            .expect("secret is non-empty");
        store.insert_principal(principal);
    }

    #[test]
    fn counter_mode_code_verifies_exactly_once() -> Result<(), Error> {
        let (store, _clock, service) = setup(OtpMode::Counter);
        insert_principal(&store, "p1");

        let code = service.generate("p1")?;
        service.verify("p1", &code)?;
        assert!(matches!(
            service.verify("p1", &code),
            Err(Error::InvalidCode)
        ));
        Ok(())
    }

    #[test]
    fn counter_advances_on_generate_and_verify() -> Result<(), Error> {
        let (store, _clock, service) = setup(OtpMode::Counter);
        insert_principal(&store, "p1");

        let code = service.generate("p1")?;
        let after_generate = store.principal_by_id("p1")?.map(|p| p.otp_counter);
        assert_eq!(after_generate, Some(1));

        service.verify("p1", &code)?;
        let after_verify = store.principal_by_id("p1")?.map(|p| p.otp_counter);
        assert_eq!(after_verify, Some(2));
        Ok(())
    }

    #[test]
    fn concurrent_verifications_of_one_code_succeed_exactly_once() -> Result<(), Error> {
        let (store, _clock, service) = setup(OtpMode::Counter);
        insert_principal(&store, "p1");
        let code = service.generate("p1")?;

        let service = Arc::new(service);
        let barrier = Arc::new(std::sync::Barrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = Arc::clone(&service);
            let code = code.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                service.verify("p1", &code).is_ok()
            }));
        }
        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(false))
            .filter(|verified| *verified)
            .count();
        assert_eq!(successes, 1);
        Ok(())
    }

    #[test]
    fn oversized_digit_config_still_generates_valid_codes() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let start = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        let clock = Arc::new(ManualClock::new(start));
        let config = AuthConfig::new()
            .with_otp_mode(OtpMode::Counter)
            .with_otp_digits(10);
        let lockout = LockoutTracker::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            &config,
        );
        let service = OtpService::new(
            Arc::clone(&store) as Arc<dyn AuthStore>,
            clock as Arc<dyn Clock>,
            lockout,
            &config,
        );
        insert_principal(&store, "p1");

        // The configured width is clamped to the widest derivable code.
        let code = service.generate("p1")?;
        assert_eq!(code.len(), 9);
        service.verify("p1", &code)?;
        Ok(())
    }

    #[test]
    fn time_mode_tolerates_one_step_of_drift() -> Result<(), Error> {
        let (store, clock, service) = setup(OtpMode::Time);
        insert_principal(&store, "p1");

        let code = service.generate("p1")?;
        clock.advance(Duration::seconds(30));
        service.verify("p1", &code)?;
        Ok(())
    }

    #[test]
    fn time_mode_rejects_stale_codes() -> Result<(), Error> {
        let (store, clock, service) = setup(OtpMode::Time);
        insert_principal(&store, "p1");

        let code = service.generate("p1")?;
        clock.advance(Duration::seconds(120));
        assert!(matches!(
            service.verify("p1", &code),
            Err(Error::InvalidCode)
        ));
        Ok(())
    }

    #[test]
    fn time_mode_does_not_touch_the_counter() -> Result<(), Error> {
        let (store, _clock, service) = setup(OtpMode::Time);
        insert_principal(&store, "p1");

        let _code = service.generate("p1")?;
        let counter = store.principal_by_id("p1")?.map(|p| p.otp_counter);
        assert_eq!(counter, Some(0));
        Ok(())
    }

    #[test]
    fn empty_code_is_invalid_without_recording_an_attempt() -> Result<(), Error> {
        let (store, _clock, service) = setup(OtpMode::Counter);
        insert_principal(&store, "p1");

        assert!(matches!(service.verify("p1", "  "), Err(Error::InvalidCode)));
        let attempts = store.principal_by_id("p1")?.map(|p| p.failed_attempts);
        assert_eq!(attempts, Some(0));
        Ok(())
    }

    #[test]
    fn unknown_principal_is_not_found() {
        let (_store, _clock, service) = setup(OtpMode::Counter);
        assert!(matches!(service.generate("ghost"), Err(Error::NotFound)));
        assert!(matches!(
            service.verify("ghost", "123456"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn failures_lock_after_max_attempts() -> Result<(), Error> {
        let (store, _clock, service) = setup(OtpMode::Counter);
        insert_principal(&store, "p1");

        for _ in 0..5 {
            assert!(matches!(
                service.verify("p1", "000000"),
                Err(Error::InvalidCode)
            ));
        }
        assert!(matches!(
            service.verify("p1", "000000"),
            Err(Error::AccountLocked)
        ));
        Ok(())
    }
}
