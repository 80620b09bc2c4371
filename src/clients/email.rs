//! Transactional email: provider client, a logging fallback and the message
//! templates the service layer sends.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Send and log the outcome. Mail is best effort: a provider outage must
/// never fail the request that triggered it.
pub async fn deliver(mailer: &Arc<dyn Mailer>, message: EmailMessage) {
    match mailer.send(&message).await {
        Ok(()) => debug!(to = %message.to, subject = %message.subject, "Email sent"),
        Err(e) => warn!(to = %message.to, error = %e, "Failed to send email"),
    }
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

/// Client for JSON email APIs (Resend and compatible providers).
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    #[must_use]
    pub const fn new(client: Client, api_url: String, api_key: String, from: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = ProviderPayload {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            text: &message.text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Email provider request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Email provider returned {status}: {body}");
        }

        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Email delivery disabled; message not sent"
        );
        Ok(())
    }
}

pub mod templates {
    use super::{DateTime, EmailMessage, Utc};

    #[must_use]
    pub fn welcome(to: &str, name: &str, activation_link: Option<&str>) -> EmailMessage {
        let mut text = format!(
            "Hi {name},\n\nWelcome to Campus Loyalty! Earn points on campus purchases and \
             events, then redeem them for rewards.\n"
        );
        if let Some(link) = activation_link {
            text.push_str(&format!(
                "\nSet your password to activate your account:\n{link}\n"
            ));
        }

        EmailMessage {
            to: to.to_string(),
            subject: "Welcome to Campus Loyalty".to_string(),
            text,
        }
    }

    #[must_use]
    pub fn verification(to: &str, name: &str, link: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Verify your Campus Loyalty email".to_string(),
            text: format!("Hi {name},\n\nConfirm your email address:\n{link}\n"),
        }
    }

    #[must_use]
    pub fn password_reset(to: &str, name: &str, link: &str, expires_at: DateTime<Utc>) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Reset your Campus Loyalty password".to_string(),
            text: format!(
                "Hi {name},\n\nReset your password using the link below. It can be used once \
                 and expires {}.\n{link}\n\nIf you did not request this, ignore this email.\n",
                expires_at.format("%Y-%m-%d %H:%M UTC")
            ),
        }
    }

    #[must_use]
    pub fn event_invite(
        to: &str,
        name: &str,
        event_name: &str,
        location: &str,
        starts_at: DateTime<Utc>,
        link: &str,
    ) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: format!("You're on the guest list: {event_name}"),
            text: format!(
                "Hi {name},\n\nYou have been added to {event_name} at {location}, starting {}.\n\
                 Details: {link}\n",
                starts_at.format("%Y-%m-%d %H:%M UTC")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_includes_activation_link() {
        let msg = templates::welcome("a@mail.utoronto.ca", "Ada", Some("http://x/reset/abc"));
        assert_eq!(msg.to, "a@mail.utoronto.ca");
        assert!(msg.text.contains("http://x/reset/abc"));

        let msg = templates::welcome("a@mail.utoronto.ca", "Ada", None);
        assert!(!msg.text.contains("activate"));
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
        let msg = templates::verification("a@mail.utoronto.ca", "Ada", "http://x/verify/1");
        assert!(mailer.send(&msg).await.is_ok());
    }
}
