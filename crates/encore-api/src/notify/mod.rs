//! Out-of-band delivery of verification, reset and welcome messages
//!
//! - [`SmtpNotifier`]: real email over SMTP
//! - [`LogNotifier`]: writes the message to the log instead of sending it
//! - `RecordingNotifier` (test-utils): keeps messages in memory

mod messages;
mod smtp;

#[cfg(any(test, feature = "test-utils"))]
mod recording;

pub use messages::{MessageLinks, OutboundEmail};
pub use smtp::SmtpNotifier;

#[cfg(any(test, feature = "test-utils"))]
pub use recording::{NotificationKind, RecordingNotifier, SentNotification};

use std::time::Duration;

use async_trait::async_trait;
use encore_core::UserRole;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifier misconfigured: {0}")]
    Configuration(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), NotifyError>;

    async fn send_reset(&self, email: &str, username: &str, token: &str)
        -> Result<(), NotifyError>;

    async fn send_welcome(
        &self,
        email: &str,
        username: &str,
        role: UserRole,
    ) -> Result<(), NotifyError>;
}

/// Logs each message instead of delivering it
///
/// Used when email is disabled, e.g. in local development.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    links: MessageLinks,
}

impl LogNotifier {
    pub fn new(links: MessageLinks) -> Self {
        Self { links }
    }

    fn log(&self, message: &OutboundEmail) {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text_body,
            "Email delivery disabled, message logged"
        );
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.log(&messages::verification(&self.links, email, username, token));
        Ok(())
    }

    async fn send_reset(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.log(&messages::password_reset(&self.links, email, username, token));
        Ok(())
    }

    async fn send_welcome(
        &self,
        email: &str,
        username: &str,
        role: UserRole,
    ) -> Result<(), NotifyError> {
        self.log(&messages::welcome(email, username, role));
        Ok(())
    }
}
