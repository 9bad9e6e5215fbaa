//! Account and token records shared by the auth core

use chrono::{DateTime, Utc};
use encore_core::{AccountStatus, UserRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Persisted account row, including the password hash
///
/// Never leaves the auth boundary as-is; handlers only see [`AccountView`].
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2id PHC string (never serialized)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: AccountStatus,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn view(&self) -> AccountView {
        AccountView::from(self)
    }
}

/// Account as returned to API clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccountView {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub status: AccountStatus,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role,
            status: account.status,
            email_verified: account.email_verified,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Validated registration data with the password already hashed
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Access/refresh bearer credentials returned after login or registration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
}

/// Purpose of a single-use emailed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EphemeralTokenKind {
    EmailVerification,
    PasswordReset,
}

impl EphemeralTokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EphemeralTokenKind::EmailVerification => "email_verification",
            EphemeralTokenKind::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for EphemeralTokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored single-use token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralToken {
    pub id: i64,
    pub user_id: i64,
    pub kind: EphemeralTokenKind,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EphemeralToken {
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// Expired once `now` reaches `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A generated token not yet written to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToken {
    pub kind: EphemeralTokenKind,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_account() -> Account {
        let now = Utc::now();
        Account {
            id: 7,
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            password_hash: "$argon2id$v=19$m=4096,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            role: UserRole::Fan,
            status: AccountStatus::Active,
            email_verified: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_account_serialization_hides_hash() {
        let json = serde_json::to_string(&sample_account()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"role\":\"fan\""));
    }

    #[test]
    fn test_view_copies_public_fields() {
        let account = sample_account();
        let view = account.view();
        assert_eq!(view.id, 7);
        assert_eq!(view.username, "alice");
        assert_eq!(view.status, AccountStatus::Active);
        assert!(!view.email_verified);
    }

    #[test]
    fn test_ephemeral_token_expiry_boundary() {
        let now = Utc::now();
        let token = EphemeralToken {
            id: 1,
            user_id: 7,
            kind: EphemeralTokenKind::PasswordReset,
            token: "abc".to_string(),
            expires_at: now + Duration::hours(1),
            consumed_at: None,
            created_at: now,
        };

        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::hours(1)));
        assert!(token.is_expired_at(now + Duration::hours(2)));
        assert!(!token.is_consumed());
    }
}
