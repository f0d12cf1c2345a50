//! Outgoing mail over authenticated SMTP.

use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::MailConfig;
use crate::error::MailError;

/// Port on which SMTP expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// A plain-text message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Delivers messages. Blocking; call from `spawn_blocking`.
pub trait MailSender: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Sends through the configured SMTP relay as the configured account.
pub struct SmtpSender {
    config: Arc<MailConfig>,
}

impl SmtpSender {
    pub fn new(config: Arc<MailConfig>) -> Self {
        Self { config }
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        let from: Mailbox = self
            .config
            .username
            .parse()
            .map_err(|e| MailError::transport(format!("Invalid sender address: {e}")))?;
        let to: Mailbox = email
            .recipient
            .trim()
            .parse()
            .map_err(|e| MailError::transport(format!("Invalid recipient address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(MailError::transport)
    }

    fn transport(&self) -> Result<SmtpTransport, MailError> {
        let host = self.config.smtp_host.as_str();
        let builder = if self.config.smtp_port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(host)
        } else {
            SmtpTransport::starttls_relay(host)
        }
        .map_err(MailError::transport)?;

        let credentials = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(credentials)
            .timeout(Some(self.config.timeout))
            .build())
    }
}

impl MailSender for SmtpSender {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        let transport = self.transport()?;

        tracing::debug!(
            host = %self.config.smtp_host,
            port = self.config.smtp_port,
            recipient = %email.recipient,
            "Sending email"
        );

        match transport.send(&message) {
            Ok(_) => {
                tracing::info!(recipient = %email.recipient, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(recipient = %email.recipient, error = %e, "SMTP delivery failed");
                if e.is_permanent() && e.to_string().contains("535") {
                    Err(MailError::AuthFailure(e.to_string()))
                } else {
                    Err(MailError::transport(e))
                }
            }
        }
    }
}
