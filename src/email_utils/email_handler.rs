//! Plain-text email over SMTP with STARTTLS

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::error::{HandlerError, Result};

/// Known providers, keyed by the part of the account domain before the first dot
const SMTP_SERVERS: &[(&str, &str, u16)] = &[("gmail", "smtp.gmail.com", 587)];

#[derive(Clone)]
pub struct EmailHandler {
    sender: String,
    password: String,
    smtp_server: String,
    smtp_port: u16,
}

impl std::fmt::Debug for EmailHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailHandler")
            .field("sender", &self.sender)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

impl EmailHandler {
    /// Pick the SMTP server from the account's domain
    pub fn new(account: &str, password: &str) -> Result<Self> {
        let provider = account
            .split_once('@')
            .and_then(|(_, domain)| domain.split('.').next())
            .ok_or_else(|| HandlerError::Email(format!("invalid account '{}'", account)))?;

        let (server, port) = SMTP_SERVERS
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(provider))
            .map(|(_, server, port)| (*server, *port))
            .ok_or_else(|| {
                HandlerError::Config(format!("no SMTP server known for provider '{}'", provider))
            })?;

        Ok(Self::with_server(account, password, server, port))
    }

    pub fn with_server(account: &str, password: &str, smtp_server: &str, smtp_port: u16) -> Self {
        Self {
            sender: account.to_string(),
            password: password.to_string(),
            smtp_server: smtp_server.to_string(),
            smtp_port,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn smtp_server(&self) -> (&str, u16) {
        (&self.smtp_server, self.smtp_port)
    }

    /// Multipart message with a single text/plain part
    pub fn build_message(&self, receiver: &str, subject: &str, text: &str) -> Result<Message> {
        let from: Mailbox = self
            .sender
            .parse()
            .map_err(|e| HandlerError::Email(format!("invalid sender '{}': {}", self.sender, e)))?;
        let to: Mailbox = receiver
            .parse()
            .map_err(|e| HandlerError::Email(format!("invalid receiver '{}': {}", receiver, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::mixed().singlepart(SinglePart::plain(text.to_string())))
            .map_err(|e| HandlerError::Email(e.to_string()))
    }

    pub async fn send(&self, receiver: &str, subject: &str, text: &str) -> Result<()> {
        let message = self.build_message(receiver, subject, text)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_server)
            .map_err(|e| HandlerError::Email(e.to_string()))?
            .port(self.smtp_port)
            .credentials(Credentials::new(self.sender.clone(), self.password.clone()))
            .build();

        match mailer.send(message).await {
            Ok(_) => {
                info!("Email sent successfully to {}", receiver);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", receiver, e);
                Err(HandlerError::Email(e.to_string()))
            }
        }
    }
}
