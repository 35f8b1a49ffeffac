//! Maps parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, mail};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let mail_opts = mail::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        token_secret: auth_opts.token_secret,
        mail_api_url: mail_opts.api_url,
        mail_api_key: mail_opts.api_key,
        mail_from: mail_opts.from,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const DSN: &str = "postgres://user@localhost:5432/bpstreet";

    #[test]
    fn token_secret_required() {
        temp_env::with_vars(
            [
                ("BPSTREET_TOKEN_SECRET", None::<&str>),
                ("BPSTREET_DSN", Some(DSN)),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["bpstreet"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --token-secret"));
                }
            },
        );
    }

    #[test]
    fn ttl_must_be_positive() {
        temp_env::with_vars(
            [
                ("BPSTREET_TOKEN_SECRET", Some("s3cret")),
                ("BPSTREET_DSN", Some(DSN)),
                ("BPSTREET_OTP_TTL_SECONDS", Some("0")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["bpstreet"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("--otp-ttl-seconds"));
                }
            },
        );
    }

    #[test]
    fn server_args_from_env() {
        temp_env::with_vars(
            [
                ("BPSTREET_TOKEN_SECRET", Some("s3cret")),
                ("BPSTREET_DSN", Some(DSN)),
                ("BPSTREET_OTP_TTL_SECONDS", None),
                ("BPSTREET_MAIL_API_URL", Some("")),
                ("BPSTREET_MAIL_API_KEY", Some("re_123")),
                ("BPSTREET_FRONTEND_BASE_URL", Some("https://thebpstreet.in")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["bpstreet"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.dsn, DSN);
                    assert_eq!(args.otp_ttl_seconds, 600);
                    assert_eq!(args.frontend_base_url, "https://thebpstreet.in");
                    assert_eq!(args.token_secret.expose_secret(), "s3cret");
                    assert_eq!(args.mail_api_url, None);
                    assert_eq!(
                        args.mail_api_key
                            .as_ref()
                            .map(|key| key.expose_secret().to_string()),
                        Some("re_123".to_string())
                    );
                }
            },
        );
    }
}
