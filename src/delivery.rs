//! Out-of-band delivery of passcodes and magic links.
//!
//! The core only hands the secret value to a collaborator; transport
//! (mail, SMS, push) belongs to the host. Delivery failures are reported
//! to the caller's logs but never fail the requesting operation, so an
//! outbound outage cannot be used to probe which principals exist.

use anyhow::Result;

use crate::models::Principal;

pub trait Delivery: Send + Sync {
    /// Hand the secret value (a passcode or a magic-link token) to the
    /// principal through an out-of-band channel.
    ///
    /// # Errors
    /// Transport failures. Callers log these and carry on.
    fn deliver(&self, principal: &Principal, value: &str) -> Result<()>;
}

/// Delivery that discards everything. For hosts that generate and present
/// codes through another path.
pub struct NullDelivery;

impl Delivery for NullDelivery {
    fn deliver(&self, _principal: &Principal, _value: &str) -> Result<()> {
        Ok(())
    }
}
