//! Signed bearer tokens and their revocation denylist.

mod denylist;
mod jwt;
mod service;

pub use denylist::Denylist;
pub use jwt::{Claims, Signer};
pub use service::TokenService;
