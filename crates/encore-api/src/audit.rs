//! Security audit logging for account events
//!
//! Events are written at INFO level on the "audit" target so they can be
//! routed apart from application logs. Each record carries the serialized
//! event plus the caller's IP address and user agent when known.

use axum::http::HeaderMap;
use encore_core::UserRole;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Account and authentication events worth auditing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: i64,
        email: String,
        role: UserRole,
    },
    RegistrationFailure {
        email: String,
        reason: String,
    },
    LoginSuccess {
        user_id: i64,
        email: String,
    },
    LoginFailure {
        email: String,
        reason: String,
    },
    EmailVerified {
        user_id: i64,
        email: String,
    },
    EmailVerificationFailure {
        reason: String,
    },
    PasswordResetRequested {
        email: String,
    },
    PasswordResetCompleted {
        user_id: i64,
    },
    PasswordResetFailure {
        reason: String,
    },
    TokenRefresh {
        user_id: i64,
    },
    Logout {
        user_id: i64,
        email: String,
    },
    InvalidToken {
        reason: String,
    },
    AccessDenied {
        user_id: i64,
        email: String,
        required_role: UserRole,
    },
    AccountCreated {
        user_id: i64,
        actor_id: i64,
        role: UserRole,
    },
    AccountUpdated {
        user_id: i64,
        actor_id: i64,
    },
    AccountDeactivated {
        user_id: i64,
        actor_id: i64,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::EmailVerified { .. } => "Email verified",
            AuditEvent::EmailVerificationFailure { .. } => "Email verification failed",
            AuditEvent::PasswordResetRequested { .. } => "Password reset requested",
            AuditEvent::PasswordResetCompleted { .. } => "Password reset completed",
            AuditEvent::PasswordResetFailure { .. } => "Password reset failed",
            AuditEvent::TokenRefresh { .. } => "Access token refreshed",
            AuditEvent::Logout { .. } => "Logout",
            AuditEvent::InvalidToken { .. } => "Invalid token presented",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::AccountCreated { .. } => "Account created",
            AuditEvent::AccountUpdated { .. } => "Account updated",
            AuditEvent::AccountDeactivated { .. } => "Account deactivated",
        }
    }

    /// Account the event is about, if known
    pub fn user_id(&self) -> Option<i64> {
        match self {
            AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::EmailVerified { user_id, .. }
            | AuditEvent::PasswordResetCompleted { user_id }
            | AuditEvent::TokenRefresh { user_id }
            | AuditEvent::Logout { user_id, .. }
            | AuditEvent::AccessDenied { user_id, .. }
            | AuditEvent::AccountCreated { user_id, .. }
            | AuditEvent::AccountUpdated { user_id, .. }
            | AuditEvent::AccountDeactivated { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AuditEvent::RegistrationFailure { .. }
                | AuditEvent::LoginFailure { .. }
                | AuditEvent::EmailVerificationFailure { .. }
                | AuditEvent::PasswordResetFailure { .. }
                | AuditEvent::InvalidToken { .. }
                | AuditEvent::AccessDenied { .. }
        )
    }
}

/// Caller details taken from request headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Write an audit record
pub fn audit_log(event: &AuditEvent, meta: &RequestMeta) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let outcome = if event.is_failure() {
        "failure"
    } else {
        "success"
    };

    info!(
        target: "audit",
        user_id = ?event.user_id(),
        outcome,
        ip_address = ?meta.ip_address,
        user_agent = ?meta.user_agent,
        event = %event_json,
        "{}",
        event.summary()
    );
}

/// Client IP from X-Forwarded-For (first hop) or X-Real-IP
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(str::to_string)
}
