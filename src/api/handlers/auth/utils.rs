//! Small helpers for auth validation, codes and session tokens.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, Rng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Trim surrounding whitespace. Addresses are case-sensitive as stored.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// The part before `@`, used as the default display name.
pub(crate) fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Six-digit code drawn uniformly from 100000..=999999.
pub(super) fn generate_otp_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the database stores a hash.
pub(super) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never touch the database.
pub(super) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash of a random secret nobody knows. Sign-in never reads it.
pub(super) fn generate_password_placeholder() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate password placeholder")?;
    let digest = Sha256::digest(bytes);
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_but_keeps_case() {
        assert_eq!(normalize_email("  Alice@Example.com "), "Alice@Example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@x.com"));
        assert!(valid_email("name.surname@example.co.in"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email(""));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("no-tld@example"));
        assert!(!valid_email("spaces in@x.com"));
    }

    #[test]
    fn local_part_before_at() {
        assert_eq!(local_part("a@x.com"), "a");
        assert_eq!(local_part("first.last@example.com"), "first.last");
        assert_eq!(local_part("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn otp_codes_are_six_digits_in_range() {
        for _ in 0..1000 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap_or(0);
            assert!((100_000..=999_999).contains(&value), "out of range: {code}");
        }
    }

    #[test]
    fn session_tokens_decode_to_32_bytes() -> Result<()> {
        let token = generate_session_token()?;
        let decoded = Base64UrlUnpadded::decode_vec(&token)
            .map_err(|err| anyhow::anyhow!("decode session token: {err}"))?;
        assert_eq!(decoded.len(), 32);
        assert_ne!(token, generate_session_token()?);
        Ok(())
    }

    #[test]
    fn hash_session_token_stable() {
        assert_eq!(hash_session_token("token"), hash_session_token("token"));
        assert_ne!(hash_session_token("token"), hash_session_token("other"));
        assert_eq!(hash_session_token("token").len(), 32);
    }

    #[test]
    fn password_placeholder_is_random_hex() -> Result<()> {
        let first = generate_password_placeholder()?;
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, generate_password_placeholder()?);
        Ok(())
    }

    #[test]
    fn now_is_after_2024() {
        assert!(now_unix_seconds() > 1_704_067_200);
    }
}
