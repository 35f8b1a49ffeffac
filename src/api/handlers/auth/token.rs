//! Bearer tokens for the mobile channel.
//!
//! Tokens are PASETO `v4.local` (encrypted and authenticated with a key derived
//! from the configured secret) carrying `{id, email, name, iat, exp}`. They are
//! stateless: once issued a token stays valid until `exp`.

use pasetors::errors::Error as PasetorsError;
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::{LocalToken, V4};
use pasetors::Local;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const HEADER: &str = "v4.local.";

// Binds tokens to this use; a v4.local token minted for anything else fails to decrypt.
const IMPLICIT_ASSERTION: &[u8] = b"bpstreet:mobile-login";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("unsupported token version or purpose")]
    UnsupportedVersion,
    #[error("token failed authentication")]
    Forged,
    #[error("token expired")]
    Expired,
    #[error("signing key rejected")]
    InvalidKey,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenClaims {
    pub id: String,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenSigner {
    secret: SecretString,
    ttl_seconds: i64,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: SecretString, ttl_seconds: i64) -> Self {
        Self {
            secret,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token for the identity, valid from `now` for the configured TTL.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or the key is rejected.
    pub fn issue(&self, id: Uuid, email: &str, name: &str, now: i64) -> Result<String, TokenError> {
        let claims = TokenClaims {
            id: id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;

        LocalToken::encrypt(&self.key()?, &payload, None, Some(IMPLICIT_ASSERTION))
            .map_err(|err| map_paseto_error(&err))
    }

    /// Check version, authentication and expiry, in that order.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn verify(&self, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
        if !token.starts_with(HEADER) {
            return Err(TokenError::UnsupportedVersion);
        }
        let untrusted =
            UntrustedToken::<Local, V4>::try_from(token).map_err(|_| TokenError::Malformed)?;
        if !untrusted.untrusted_footer().is_empty() {
            return Err(TokenError::Malformed);
        }

        let trusted = LocalToken::decrypt(&self.key()?, &untrusted, None, Some(IMPLICIT_ASSERTION))
            .map_err(|err| map_paseto_error(&err))?;
        let claims: TokenClaims =
            serde_json::from_str(trusted.payload()).map_err(|_| TokenError::Malformed)?;
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn key(&self) -> Result<SymmetricKey<V4>, TokenError> {
        let digest = Sha256::digest(self.secret.expose_secret().as_bytes());
        SymmetricKey::<V4>::from(digest.as_slice()).map_err(|_| TokenError::InvalidKey)
    }
}

fn map_paseto_error(err: &PasetorsError) -> TokenError {
    match err {
        PasetorsError::TokenValidation => TokenError::Forged,
        PasetorsError::Key => TokenError::InvalidKey,
        _ => TokenError::Malformed,
    }
}
