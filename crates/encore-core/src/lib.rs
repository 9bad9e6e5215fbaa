//! Encore Core - Domain vocabulary, errors and configuration
//!
//! This crate defines the shared pieces used by the account backend:
//! - Account roles and statuses
//! - The partial-update patch applied to accounts
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, EmailConfig, JwtSettings, LoggingConfig,
    ServerConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

// ============================================================================
// Error Types
// ============================================================================

/// Errors parsing the stored role and status vocabulary
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid account status: {0}")]
    InvalidStatus(String),
}

// ============================================================================
// Roles
// ============================================================================

/// Marketplace role attached to every account
///
/// `Buyer` is a legacy role: existing rows may carry it, but new
/// registrations cannot choose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Moderator,
    Producer,
    Artist,
    Fan,
    Buyer,
}

impl UserRole {
    /// Roles a new account may register with, in display order
    pub const REGISTRABLE: [UserRole; 5] = [
        UserRole::Producer,
        UserRole::Artist,
        UserRole::Fan,
        UserRole::Moderator,
        UserRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Moderator => "moderator",
            UserRole::Producer => "producer",
            UserRole::Artist => "artist",
            UserRole::Fan => "fan",
            UserRole::Buyer => "buyer",
        }
    }

    /// Whether a registration request may ask for this role
    pub fn is_registrable(&self) -> bool {
        !matches!(self, UserRole::Buyer)
    }

    /// Human-readable label for role pickers
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Moderator => "Moderator",
            UserRole::Producer => "Producer",
            UserRole::Artist => "Artist",
            UserRole::Fan => "Fan",
            UserRole::Buyer => "Buyer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            UserRole::Admin => "Platform administrators",
            UserRole::Moderator => "Platform moderators",
            UserRole::Producer => "Music creators who sell beats",
            UserRole::Artist => "Music creators who buy beats",
            UserRole::Fan => "General users who participate in auctions",
            UserRole::Buyer => "Legacy purchasing account",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = CoreError;

    // Case-sensitive: stored and submitted roles are lowercase.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "moderator" => Ok(UserRole::Moderator),
            "producer" => Ok(UserRole::Producer),
            "artist" => Ok(UserRole::Artist),
            "fan" => Ok(UserRole::Fan),
            "buyer" => Ok(UserRole::Buyer),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Account status
// ============================================================================

/// Activity axis of an account, independent of email verification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "suspended" => Ok(AccountStatus::Suspended),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Account patch
// ============================================================================

/// Partial update of an account's mutable profile fields
///
/// Absent fields are left untouched. Applying any patch, even an empty one,
/// bumps the account's `updated_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
            && self.status.is_none()
    }

    /// Patch that only moves the account to a new status
    pub fn status(status: AccountStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}
