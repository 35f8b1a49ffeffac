//! Sign-in handlers and supporting modules.
//!
//! Customers authenticate with a one-time code mailed to their address. The
//! browser flow ends in a session cookie, the mobile flow in a PASETO bearer
//! token; [`principal`] resolves either into the same current identity.
//!
//! ## Code lifecycle
//!
//! - **Issue:** older codes for the address are deleted (best-effort) before the
//!   new one is stored, so at most one code is usable at a time.
//! - **Verify:** the matching unused, unexpired row is marked used in a single
//!   statement; leftover codes for the address are deleted afterwards.
//! - **Expiry:** 10 minutes by default (`--otp-ttl-seconds`).
//!
//! ## New identities
//!
//! The first successful browser verification provisions the identity (name
//! defaults to the address local part) and an empty cart. `isNewUser` stays
//! `true` until the customer stores a display name via `update-name`.

pub(crate) mod account;
pub(crate) mod mobile;
pub(crate) mod otp;
pub(crate) mod principal;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use principal::CurrentUser;
pub use state::{AuthConfig, AuthState};
pub use token::TokenSigner;
