//! Outbound mail for sign-in codes.
//!
//! The issuer hands a rendered [`MailMessage`] to a [`Mailer`] and waits for the
//! result; there is no queue. A dispatch error surfaces to the caller, while
//! the code stays stored so it can still be resent.
//!
//! `LogMailer` is the local dev default and only logs the message. `HttpMailer`
//! posts JSON (`from`, `to`, `subject`, `html`) to a transactional mail API with a
//! bearer API key.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::APP_USER_AGENT;

pub const STORE_NAME: &str = "The BP Street";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Mail delivery abstraction used by the code issuer.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or return the upstream error.
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Local dev mailer that logs instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "mail send stub"
        );
        Ok(())
    }
}

#[derive(Serialize, Debug)]
struct HttpMailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: SecretString,
    from: String,
}

impl HttpMailer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: String, api_key: SecretString, from: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build mail HTTP client")?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let body = HttpMailBody {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("mail API request failed")?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %message.to, "mail accepted by API");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(anyhow!("mail API returned {status}: {detail}"))
    }
}

/// Mail settings collected from the CLI.
#[derive(Clone, Debug)]
pub struct MailConfig {
    api_url: Option<String>,
    api_key: Option<SecretString>,
    from: String,
}

impl MailConfig {
    #[must_use]
    pub fn new(api_url: Option<String>, api_key: Option<SecretString>, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
        }
    }

    /// `HttpMailer` when an API URL is configured, `LogMailer` otherwise.
    ///
    /// # Errors
    /// Returns an error if the URL is set without an API key or the client cannot be built.
    pub fn build(self) -> Result<Arc<dyn Mailer>> {
        let Some(api_url) = self.api_url.filter(|url| !url.trim().is_empty()) else {
            info!("No mail API configured, sign-in codes are only logged");
            return Ok(Arc::new(LogMailer));
        };
        let api_key = self
            .api_key
            .ok_or_else(|| anyhow!("--mail-api-key is required with --mail-api-url"))?;
        Ok(Arc::new(HttpMailer::new(api_url, api_key, self.from)?))
    }
}

/// Render the sign-in code email.
#[must_use]
pub fn otp_message(to: &str, code: &str, ttl_minutes: i64) -> MailMessage {
    let html = format!(
        r#"<div style="font-family: 'Segoe UI', Tahoma, sans-serif; max-width: 500px; margin: 0 auto; padding: 30px;">
  <h1 style="color: #FF6B35; text-align: center;">{STORE_NAME}</h1>
  <p style="color: #666; text-align: center;">Authentic Street Food</p>
  <h2 style="color: #1a1a1a;">Your Login OTP</h2>
  <p style="color: #666;">Enter this code to sign in to your account. It expires in <strong>{ttl_minutes} minutes</strong>.</p>
  <div style="background: #FF6B35; padding: 20px 30px; border-radius: 12px; text-align: center;">
    <span style="font-size: 36px; font-weight: bold; color: white; letter-spacing: 8px;">{code}</span>
  </div>
  <p style="color: #999; font-size: 13px; text-align: center;">If you didn't request this code, please ignore this email.</p>
</div>"#
    );

    MailMessage {
        to: to.to_string(),
        subject: format!("Your OTP: {code} - {STORE_NAME}"),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_message_carries_code_and_expiry() {
        let message = otp_message("a@x.com", "482913", 10);
        assert_eq!(message.to, "a@x.com");
        assert_eq!(message.subject, "Your OTP: 482913 - The BP Street");
        assert!(message.html.contains("482913"));
        assert!(message.html.contains("10 minutes"));
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        let message = otp_message("a@x.com", "123456", 10);
        assert!(LogMailer.send(&message).await.is_ok());
    }

    #[test]
    fn mail_config_requires_key_with_url() {
        let config = MailConfig::new(
            Some("https://api.mail.test/emails".to_string()),
            None,
            "The BP Street <orders@thebpstreet.in>".to_string(),
        );
        assert!(config.build().is_err());
    }

    #[test]
    fn mail_config_without_url_logs() {
        let config = MailConfig::new(Some("  ".to_string()), None, String::new());
        assert!(config.build().is_ok());
    }

    #[test]
    fn http_mail_body_shape() -> Result<()> {
        let body = HttpMailBody {
            from: "The BP Street <orders@thebpstreet.in>",
            to: ["a@x.com"],
            subject: "Your OTP: 123456 - The BP Street",
            html: "<p>123456</p>",
        };
        let value = serde_json::to_value(&body)?;
        assert_eq!(value["to"][0], "a@x.com");
        assert_eq!(value["from"], "The BP Street <orders@thebpstreet.in>");
        Ok(())
    }
}
