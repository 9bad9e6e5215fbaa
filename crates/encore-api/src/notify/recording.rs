//! Notifier that records messages in memory

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use encore_core::UserRole;

use super::{Notifier, NotifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Verification,
    PasswordReset,
    Welcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub kind: NotificationKind,
    pub email: String,
    pub username: String,
    pub token: Option<String>,
}

/// Keeps every message; individual kinds can be made to fail
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail_verification: AtomicBool,
    fail_reset: AtomicBool,
    fail_welcome: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send of `kind` fail (or succeed again)
    pub fn set_failing(&self, kind: NotificationKind, failing: bool) {
        self.flag(kind).store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_of(&self, kind: NotificationKind) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }

    /// Token of the latest message of `kind` sent to `email`
    pub fn last_token(&self, kind: NotificationKind, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|n| n.kind == kind && n.email == email)
            .and_then(|n| n.token)
    }

    fn flag(&self, kind: NotificationKind) -> &AtomicBool {
        match kind {
            NotificationKind::Verification => &self.fail_verification,
            NotificationKind::PasswordReset => &self.fail_reset,
            NotificationKind::Welcome => &self.fail_welcome,
        }
    }

    fn record(
        &self,
        kind: NotificationKind,
        email: &str,
        username: &str,
        token: Option<&str>,
    ) -> Result<(), NotifyError> {
        if self.flag(kind).load(Ordering::SeqCst) {
            return Err(NotifyError::SendFailed(format!(
                "{kind:?} delivery disabled"
            )));
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentNotification {
                kind,
                email: email.to_string(),
                username: username.to_string(),
                token: token.map(str::to_string),
            });
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.record(NotificationKind::Verification, email, username, Some(token))
    }

    async fn send_reset(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.record(NotificationKind::PasswordReset, email, username, Some(token))
    }

    async fn send_welcome(
        &self,
        email: &str,
        username: &str,
        _role: UserRole,
    ) -> Result<(), NotifyError> {
        self.record(NotificationKind::Welcome, email, username, None)
    }
}
