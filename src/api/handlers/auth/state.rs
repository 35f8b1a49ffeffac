//! Auth state and configuration.

use std::sync::Arc;

use crate::api::mail::Mailer;

use super::token::TokenSigner;

const DEFAULT_OTP_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    otp_ttl_seconds: i64,
    session_ttl_seconds: i64,
    token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    signer: TokenSigner,
    mailer: Arc<dyn Mailer>,
}

impl AuthState {
    pub fn new(config: AuthConfig, signer: TokenSigner, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config,
            signer,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub(crate) fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://thebpstreet.in".to_string());

        assert_eq!(config.frontend_base_url(), "https://thebpstreet.in");
        assert_eq!(config.otp_ttl_seconds(), 600);
        assert_eq!(config.session_ttl_seconds(), 2_592_000);
        assert_eq!(config.token_ttl_seconds(), 2_592_000);
        assert!(config.session_cookie_secure());

        let config = AuthConfig::new("http://localhost:3000".to_string())
            .with_otp_ttl_seconds(60)
            .with_session_ttl_seconds(3600)
            .with_token_ttl_seconds(7200);

        assert_eq!(config.otp_ttl_seconds(), 60);
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.token_ttl_seconds(), 7200);
        assert!(!config.session_cookie_secure());
    }
}
