//! SMTP delivery via lettre

use std::time::Duration;

use async_trait::async_trait;
use encore_core::{EmailConfig, UserRole};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use super::messages::{self, MessageLinks, OutboundEmail};
use super::{Notifier, NotifyError};

/// Sends messages through an SMTP relay using STARTTLS
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    links: MessageLinks,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig, links: MessageLinks) -> Result<Self, NotifyError> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                NotifyError::Configuration(format!("invalid sender address: {e}"))
            })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Configuration(e.to_string()))?
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if !config.smtp_user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_password.clone(),
            ));
        }

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            "SMTP notifier initialized"
        );

        Ok(Self {
            transport: builder.build(),
            from,
            links,
        })
    }

    async fn deliver(&self, outbound: OutboundEmail) -> Result<(), NotifyError> {
        let to: Mailbox = outbound
            .to
            .parse()
            .map_err(|_| NotifyError::InvalidRecipient(outbound.to.clone()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(outbound.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(outbound.text_body)
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %outbound.to, subject = %outbound.subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                error!(to = %outbound.to, error = %e, "Failed to send email");
                Err(NotifyError::SendFailed(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(messages::verification(&self.links, email, username, token))
            .await
    }

    async fn send_reset(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(messages::password_reset(&self.links, email, username, token))
            .await
    }

    async fn send_welcome(
        &self,
        email: &str,
        username: &str,
        role: UserRole,
    ) -> Result<(), NotifyError> {
        self.deliver(messages::welcome(email, username, role)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> MessageLinks {
        MessageLinks::new("http://localhost:8080", "http://localhost:3000")
    }

    fn config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            smtp_host: "smtp.example.com".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_builds_with_valid_sender() {
        assert!(SmtpNotifier::new(&config(), links()).is_ok());
    }

    #[tokio::test]
    async fn test_rejects_invalid_sender() {
        let mut config = config();
        config.from_email = "not an address".to_string();
        assert!(matches!(
            SmtpNotifier::new(&config, links()),
            Err(NotifyError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_before_connecting() {
        let notifier = SmtpNotifier::new(&config(), links()).unwrap();
        assert!(matches!(
            notifier.send_reset("not-an-email", "alice", "tok").await,
            Err(NotifyError::InvalidRecipient(_))
        ));
    }
}
