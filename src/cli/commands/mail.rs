use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_MAIL_API_URL: &str = "mail-api-url";
pub const ARG_MAIL_API_KEY: &str = "mail-api-key";
pub const ARG_MAIL_FROM: &str = "mail-from";

#[derive(Debug, Clone)]
pub struct Options {
    pub api_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub from: String,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        // Env vars set to "" come through as empty values
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Self {
            api_url: get_non_empty(ARG_MAIL_API_URL),
            api_key: get_non_empty(ARG_MAIL_API_KEY).map(SecretString::from),
            from: get_non_empty(ARG_MAIL_FROM)
                .unwrap_or_else(|| "The BP Street <orders@thebpstreet.in>".to_string()),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_API_URL)
                .long(ARG_MAIL_API_URL)
                .help("Transactional mail API endpoint; codes are only logged when unset")
                .env("BPSTREET_MAIL_API_URL"),
        )
        .arg(
            Arg::new(ARG_MAIL_API_KEY)
                .long(ARG_MAIL_API_KEY)
                .help("Bearer API key for the mail API")
                .env("BPSTREET_MAIL_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for sign-in codes")
                .env("BPSTREET_MAIL_FROM")
                .default_value("The BP Street <orders@thebpstreet.in>"),
        )
}
