//! Credential lifecycle configuration.
//!
//! Values only, no behavior: OTP shape, token lifetimes, lockout policy,
//! and per-entry-point rate quotas. Signing algorithm and key material are
//! configured separately through [`crate::token::Signer`].

use crate::otp::OtpMode;
use crate::rate_limit::RateQuota;

const DEFAULT_OTP_DIGITS: u32 = 6;
const DEFAULT_TOTP_STEP_SECONDS: u64 = 30;
const DEFAULT_TOTP_SKEW: u8 = 1;
const DEFAULT_BEARER_LIFETIME_SECONDS: i64 = 60 * 60;
const DEFAULT_REFRESH_LIFETIME_SECONDS: i64 = 365 * 24 * 60 * 60;
const DEFAULT_MAGIC_LINK_LIFETIME_SECONDS: i64 = 15 * 60;
const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;
const DEFAULT_QUOTA: RateQuota = RateQuota {
    limit: 5,
    window_seconds: 10 * 60,
};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    otp_digits: u32,
    otp_mode: OtpMode,
    totp_step_seconds: u64,
    totp_skew: u8,
    bearer_lifetime_seconds: i64,
    refresh_lifetime_seconds: i64,
    magic_link_lifetime_seconds: i64,
    max_failed_attempts: u32,
    lockout_seconds: i64,
    allow_unsigned_tokens: bool,
    request_otp_quota: RateQuota,
    verify_otp_quota: RateQuota,
    request_magic_link_quota: RateQuota,
    verify_magic_link_quota: RateQuota,
    refresh_quota: RateQuota,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            otp_digits: DEFAULT_OTP_DIGITS,
            otp_mode: OtpMode::Time,
            totp_step_seconds: DEFAULT_TOTP_STEP_SECONDS,
            totp_skew: DEFAULT_TOTP_SKEW,
            bearer_lifetime_seconds: DEFAULT_BEARER_LIFETIME_SECONDS,
            refresh_lifetime_seconds: DEFAULT_REFRESH_LIFETIME_SECONDS,
            magic_link_lifetime_seconds: DEFAULT_MAGIC_LINK_LIFETIME_SECONDS,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            allow_unsigned_tokens: false,
            request_otp_quota: DEFAULT_QUOTA,
            verify_otp_quota: DEFAULT_QUOTA,
            request_magic_link_quota: DEFAULT_QUOTA,
            verify_magic_link_quota: DEFAULT_QUOTA,
            refresh_quota: DEFAULT_QUOTA,
        }
    }

    /// Passcode width in digits. Clamped to 1..=9 so the derived code
    /// always fits a `u32` modulus.
    #[must_use]
    pub fn with_otp_digits(mut self, digits: u32) -> Self {
        self.otp_digits = digits.clamp(1, 9);
        self
    }

    #[must_use]
    pub fn with_otp_mode(mut self, mode: OtpMode) -> Self {
        self.otp_mode = mode;
        self
    }

    #[must_use]
    pub fn with_totp_step_seconds(mut self, seconds: u64) -> Self {
        self.totp_step_seconds = seconds;
        self
    }

    /// Number of adjacent TOTP steps tolerated on either side for clock drift.
    #[must_use]
    pub fn with_totp_skew(mut self, steps: u8) -> Self {
        self.totp_skew = steps;
        self
    }

    #[must_use]
    pub fn with_bearer_lifetime_seconds(mut self, seconds: i64) -> Self {
        self.bearer_lifetime_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_lifetime_seconds(mut self, seconds: i64) -> Self {
        self.refresh_lifetime_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_magic_link_lifetime_seconds(mut self, seconds: i64) -> Self {
        self.magic_link_lifetime_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout_seconds = seconds;
        self
    }

    /// Allow the "none" signing algorithm. Test configurations only;
    /// production keys must be symmetric or asymmetric.
    #[must_use]
    pub fn with_allow_unsigned_tokens(mut self, allow: bool) -> Self {
        self.allow_unsigned_tokens = allow;
        self
    }

    #[must_use]
    pub fn with_request_otp_quota(mut self, quota: RateQuota) -> Self {
        self.request_otp_quota = quota;
        self
    }

    #[must_use]
    pub fn with_verify_otp_quota(mut self, quota: RateQuota) -> Self {
        self.verify_otp_quota = quota;
        self
    }

    #[must_use]
    pub fn with_request_magic_link_quota(mut self, quota: RateQuota) -> Self {
        self.request_magic_link_quota = quota;
        self
    }

    #[must_use]
    pub fn with_verify_magic_link_quota(mut self, quota: RateQuota) -> Self {
        self.verify_magic_link_quota = quota;
        self
    }

    #[must_use]
    pub fn with_refresh_quota(mut self, quota: RateQuota) -> Self {
        self.refresh_quota = quota;
        self
    }

    #[must_use]
    pub fn otp_digits(&self) -> u32 {
        self.otp_digits
    }

    #[must_use]
    pub fn otp_mode(&self) -> OtpMode {
        self.otp_mode
    }

    #[must_use]
    pub fn totp_step_seconds(&self) -> u64 {
        self.totp_step_seconds
    }

    #[must_use]
    pub fn totp_skew(&self) -> u8 {
        self.totp_skew
    }

    #[must_use]
    pub fn bearer_lifetime_seconds(&self) -> i64 {
        self.bearer_lifetime_seconds
    }

    #[must_use]
    pub fn refresh_lifetime_seconds(&self) -> i64 {
        self.refresh_lifetime_seconds
    }

    #[must_use]
    pub fn magic_link_lifetime_seconds(&self) -> i64 {
        self.magic_link_lifetime_seconds
    }

    #[must_use]
    pub fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    #[must_use]
    pub fn lockout_seconds(&self) -> i64 {
        self.lockout_seconds
    }

    #[must_use]
    pub fn allow_unsigned_tokens(&self) -> bool {
        self.allow_unsigned_tokens
    }

    #[must_use]
    pub fn request_otp_quota(&self) -> RateQuota {
        self.request_otp_quota
    }

    #[must_use]
    pub fn verify_otp_quota(&self) -> RateQuota {
        self.verify_otp_quota
    }

    #[must_use]
    pub fn request_magic_link_quota(&self) -> RateQuota {
        self.request_magic_link_quota
    }

    #[must_use]
    pub fn verify_magic_link_quota(&self) -> RateQuota {
        self.verify_magic_link_quota
    }

    #[must_use]
    pub fn refresh_quota(&self) -> RateQuota {
        self.refresh_quota
    }
}
