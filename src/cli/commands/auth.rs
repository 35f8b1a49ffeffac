use anyhow::{bail, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_TOKEN_SECRET: &str = "token-secret";

#[derive(Debug, Clone)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub token_ttl_seconds: i64,
    pub token_secret: SecretString,
}

impl Options {
    /// Parse sign-in arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the token secret is missing or a TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let token_secret = match matches.get_one::<String>(ARG_TOKEN_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => bail!("missing required argument: --{ARG_TOKEN_SECRET}"),
        };

        let ttl = |id: &str| -> Result<i64> {
            let value = matches.get_one::<i64>(id).copied().unwrap_or_default();
            if value <= 0 {
                bail!("--{id} must be greater than zero");
            }
            Ok(value)
        };

        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            session_ttl_seconds: ttl(ARG_SESSION_TTL_SECONDS)?,
            otp_ttl_seconds: ttl(ARG_OTP_TTL_SECONDS)?,
            token_ttl_seconds: ttl(ARG_TOKEN_TTL_SECONDS)?,
            token_secret,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Storefront base URL, used as the CORS origin")
                .long_help(
                    "Storefront base URL. Its origin is the only one allowed by CORS, and an https URL marks the session cookie Secure.",
                )
                .env("BPSTREET_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("BPSTREET_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("Sign-in code TTL in seconds")
                .env("BPSTREET_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Mobile bearer token TTL in seconds")
                .env("BPSTREET_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HMAC key used to sign mobile bearer tokens")
                .env("BPSTREET_TOKEN_SECRET")
                .hide_env_values(true),
        )
}
