//! Authentication-token lifecycle core.
//!
//! Issues, verifies, refreshes, and revokes credentials for a principal
//! using three interchangeable proof mechanisms: one-time passcodes
//! (HOTP/TOTP), single-use magic links, and rotating refresh tokens. Each
//! successful proof is exchanged for a signed, time-bounded bearer token
//! that can later be resolved back to its principal or revoked.
//!
//! The crate is a library core: persistence ([`store::AuthStore`]),
//! out-of-band delivery ([`delivery::Delivery`]), time ([`clock::Clock`]),
//! and rate limiting ([`rate_limit::RateLimiter`]) are collaborators
//! reached through traits, with in-process implementations provided for
//! tests and single-process hosts.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera::{
//!     AuthConfig, AuthService, FixedWindowLimiter, MemoryStore, NullDelivery, Signer,
//!     SystemClock,
//! };
//!
//! # fn main() -> Result<(), tessera::Error> {
//! let store = Arc::new(MemoryStore::new());
//! let clock = Arc::new(SystemClock);
//! let limiter = Arc::new(FixedWindowLimiter::new(clock.clone()));
//! let auth = AuthService::new(
//!     store,
//!     clock,
//!     Signer::hs256(*b"an-at-least-256-bit-signing-key!"),
//!     limiter,
//!     Arc::new(NullDelivery),
//!     AuthConfig::new(),
//! )?;
//!
//! auth.request_otp("203.0.113.7", "principal-1")?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod lockout;
pub mod models;
pub mod otp;
pub mod rate_limit;
pub mod service;
pub mod single_use;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use delivery::{Delivery, NullDelivery};
pub use error::Error;
pub use lockout::LockoutTracker;
pub use models::{generate_otp_secret, Principal, SingleUseKind, SingleUseRecord};
pub use otp::{OtpMode, OtpService};
pub use rate_limit::{FixedWindowLimiter, NoopRateLimiter, RateDecision, RateLimiter, RateQuota};
pub use service::{AuthService, SessionTokens};
pub use single_use::SingleUseTokens;
pub use store::{AuthStore, MemoryStore};
pub use token::{Claims, Denylist, Signer, TokenService};
