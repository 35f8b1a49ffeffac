use crate::{
    api::{self, mail::MailConfig, AuthConfig},
    cli::telemetry,
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub token_ttl_seconds: i64,
    pub token_secret: SecretString,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<SecretString>,
    pub mail_from: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the mail transport is misconfigured or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_token_ttl_seconds(args.token_ttl_seconds);

    let mail_config = MailConfig::new(args.mail_api_url, args.mail_api_key, args.mail_from);

    let result = api::new(
        args.port,
        args.dsn,
        auth_config,
        args.token_secret,
        mail_config,
    )
    .await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let mail_mode = if args.mail_api_url.is_some() {
        "http"
    } else {
        "log"
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("frontend_base_url", args.frontend_base_url.clone()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        ("otp_ttl_seconds", args.otp_ttl_seconds.to_string()),
        ("token_ttl_seconds", args.token_ttl_seconds.to_string()),
        (
            "mail_api_url",
            args.mail_api_url
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        ),
        ("mail_api_key_set", args.mail_api_key.is_some().to_string()),
        ("mail_from", args.mail_from.clone()),
    ];
    log_entries("Startup configuration", &entries, mail_mode);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)], mail_mode: &str) {
    let mode_desc = if mail_mode == "http" {
        "HTTP API"
    } else {
        "Log only (codes are written to the log)"
    };
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\nMail delivery: {mode_desc}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    trimmed.chars().take(7).collect()
}

const BANNER: &str = r"
   _______
  |  ___  |
  | | B | |   T H E   B P   S T R E E T {VERSION}
  | |_P_| |
  |_______|";
