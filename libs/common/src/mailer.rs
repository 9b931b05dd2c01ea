//! Outbound email over SMTP
//!
//! Services depend on the [`Mailer`] trait so that delivery can be swapped
//! for a recording implementation in tests. [`SmtpMailer`] talks to a real
//! relay over implicit TLS.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::env;
use thiserror::Error;
use tracing::{error, info};

/// Error raised when an email could not be handed to the relay
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    Address(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Failed to send email: {0}")]
    Send(String),

    #[error("Mailer configuration error: {0}")]
    Configuration(String),
}

/// A single plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Anything that can deliver an [`Email`]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// SMTP relay configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Display name used in the `From` header
    pub from_name: String,
}

impl SmtpConfig {
    /// Create a new SmtpConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SMTP_HOST`: relay host (required)
    /// - `SMTP_PORT`: relay port, implicit TLS (default: 465)
    /// - `SMTP_USERNAME`: login, also used as the sender address (required)
    /// - `SMTP_PASSWORD`: password (required)
    /// - `SMTP_FROM_NAME`: sender display name (default: "DragonAuto")
    pub fn from_env() -> Result<Self, MailError> {
        let host = env::var("SMTP_HOST")
            .map_err(|_| MailError::Configuration("SMTP_HOST not set".to_string()))?;
        let port = env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(465);
        let username = env::var("SMTP_USERNAME")
            .map_err(|_| MailError::Configuration("SMTP_USERNAME not set".to_string()))?;
        let password = env::var("SMTP_PASSWORD")
            .map_err(|_| MailError::Configuration("SMTP_PASSWORD not set".to_string()))?;
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "DragonAuto".to_string());

        Ok(Self {
            host,
            port,
            username,
            password,
            from_name,
        })
    }
}

/// Mailer backed by an async lettre SMTP transport
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = format!("{} <{}>", config.from_name, config.username)
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailError::Configuration(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        info!("SMTP mailer configured for {}:{}", config.host, config.port);

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(e.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| {
            error!("Failed to send email to {}: {}", email.to, e);
            MailError::Send(e.to_string())
        })?;

        info!("Email sent to {}", email.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            username: "noreply@example.com".to_string(),
            password: "secret".to_string(),
            from_name: "DragonAuto".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected_before_sending() {
        let mailer = SmtpMailer::new(&config()).unwrap();
        let result = mailer
            .send(Email {
                to: "not an address".to_string(),
                subject: "Hello".to_string(),
                body: "Body".to_string(),
            })
            .await;

        assert!(matches!(result, Err(MailError::Address(_))));
    }

    #[tokio::test]
    async fn test_invalid_sender_is_rejected() {
        let mut config = config();
        config.username = "broken".to_string();
        assert!(matches!(
            SmtpMailer::new(&config),
            Err(MailError::Address(_))
        ));
    }
}
