//! One-time passcode engine: counter-based (HOTP) and time-based (TOTP).

mod hotp;
mod service;

pub(crate) use hotp::hotp;
pub use service::OtpService;

/// Passcode derivation mode.
///
/// Counter mode guarantees no code is ever valid twice (the counter only
/// moves forward); time mode trades that for clock-drift tolerance and is
/// the default for interactive login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMode {
    Counter,
    Time,
}
