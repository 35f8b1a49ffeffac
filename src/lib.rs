//! # The BP Street storefront API
//!
//! `bpstreet` serves the menu, cart, checkout and order tracking for a street
//! food storefront, plus the admin console API used to manage menu items and
//! orders.
//!
//! ## Sign-in (one-time codes)
//!
//! Customers sign in with a 6-digit code mailed to their address. A new code
//! supersedes any earlier one for the same address and expires after 10
//! minutes. A code is consumed atomically on first use.
//!
//! Two channels share one identity model:
//!
//! - **Browser:** `POST /api/auth/verify-otp` binds an `HttpOnly` session cookie.
//!   Only a SHA-256 hash of the session token is stored.
//! - **Mobile:** `POST /api/auth/mobile-login` returns a PASETO bearer token valid
//!   for 30 days. There is no server-side revocation.
//!
//! Every protected handler resolves the caller through the same resolver chain
//! (session cookie first, then bearer token), so handlers never care which
//! channel authenticated the request.
//!
//! ## Authorization
//!
//! Admin routes require an identity with role `admin`. Unauthenticated callers get
//! `401`, authenticated non-admins get `403`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
