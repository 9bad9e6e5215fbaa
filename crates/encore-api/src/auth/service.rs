//! Authentication service layer
//!
//! Composes the hasher, token issuer, ephemeral token store, account manager
//! and notifier into the register / login / verify / forgot / reset /
//! refresh / profile use cases.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use encore_core::{AccountPatch, AccountStatus, UserRole};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::accounts::{AccountError, AccountManager};
use super::jwt::{JwtError, JwtService};
use super::models::{Account, AccountView, EphemeralTokenKind, NewAccount, TokenPair};
use super::password::{CredentialHasher, PasswordError, PolicyViolation};
use super::tokens::{EphemeralTokenError, EphemeralTokenStore};
use crate::notify::{Notifier, NotifyError};

// ============================================================================
// Requests and responses
// ============================================================================

/// Account registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
    /// One of producer, artist, fan, moderator, admin
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Self-service profile update
///
/// Role changes are limited to the non-staff roles; status is admin-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
}

impl From<UpdateProfileRequest> for AccountPatch {
    fn from(req: UpdateProfileRequest) -> Self {
        AccountPatch {
            email: req.email,
            username: req.username,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            status: None,
        }
    }
}

/// Administrative account creation
///
/// Unlike self-registration any role may be assigned, including `buyer`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
    pub role: UserRole,
}

/// Administrative account update
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAccountRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<AccountStatus>,
}

impl From<UpdateAccountRequest> for AccountPatch {
    fn from(req: UpdateAccountRequest) -> Self {
        AccountPatch {
            email: req.email,
            username: req.username,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            status: req.status,
        }
    }
}

/// Account plus freshly issued tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: AccountView,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

impl AuthResponse {
    fn new(account: &Account, pair: TokenPair) -> Self {
        Self {
            user: account.view(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
            expires_at: pair.expires_at,
        }
    }
}

/// Result of a successful email verification
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifiedAccount {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub email_verified: bool,
}

/// Entry of the registrable-role catalogue
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleInfo {
    pub value: UserRole,
    pub label: String,
    pub description: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Use-case level errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("{0}")]
    WeakPassword(PolicyViolation),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    /// Unknown or already used verification/reset token
    #[error("Invalid or already used token")]
    InvalidToken,

    /// Verification/reset token past its expiry
    #[error("Token has expired")]
    TokenExpired,

    /// Access or refresh token rejected
    #[error(transparent)]
    Jwt(JwtError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

impl From<AccountError> for AuthError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::EmailTaken => AuthError::EmailTaken,
            AccountError::UsernameTaken => AuthError::UsernameTaken,
            AccountError::NotFound => AuthError::NotFound("Account".to_string()),
            AccountError::InvalidCredentials => AuthError::InvalidCredentials,
            AccountError::Inactive => AuthError::AccountInactive,
            AccountError::EmailNotVerified => AuthError::EmailNotVerified,
            AccountError::Password(e) => AuthError::Internal(e.to_string()),
            AccountError::Repository(e) => AuthError::Internal(e.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(violation) => AuthError::WeakPassword(violation),
            PasswordError::Mismatch => AuthError::InvalidCredentials,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<EphemeralTokenError> for AuthError {
    fn from(err: EphemeralTokenError) -> Self {
        match err {
            EphemeralTokenError::NotFound => AuthError::InvalidToken,
            EphemeralTokenError::Expired => AuthError::TokenExpired,
            EphemeralTokenError::TtlOutOfRange => {
                AuthError::Internal("token lifetime out of range".to_string())
            }
            EphemeralTokenError::Repository(e) => AuthError::Internal(e.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Encoding(e) => AuthError::Internal(format!("token signing failed: {e}")),
            JwtError::InvalidKey(e) => AuthError::Internal(e),
            JwtError::LifetimeOutOfRange(secs) => {
                AuthError::Internal(format!("token lifetime out of range: {secs}s"))
            }
            other => AuthError::Jwt(other),
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Orchestrates the account and token lifecycle
#[derive(Clone)]
pub struct AuthService {
    accounts: AccountManager,
    tokens: EphemeralTokenStore,
    hasher: CredentialHasher,
    jwt: Arc<JwtService>,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl AuthService {
    pub fn new(
        accounts: AccountManager,
        tokens: EphemeralTokenStore,
        hasher: CredentialHasher,
        jwt: Arc<JwtService>,
        notifier: Arc<dyn Notifier>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            tokens,
            hasher,
            jwt,
            notifier,
            notify_timeout,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn accounts(&self) -> &AccountManager {
        &self.accounts
    }

    /// Register a new, unverified account and sign it in
    ///
    /// The account and its verification token are stored together; if
    /// either write fails nothing is kept. The token is then emailed; a
    /// failed email is logged and does not fail the registration.
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<AuthResponse> {
        let role: UserRole = request
            .role
            .parse()
            .map_err(|_| AuthError::InvalidRole(request.role.clone()))?;
        if !role.is_registrable() {
            return Err(AuthError::InvalidRole(request.role));
        }

        if request.password != request.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        if self.accounts.email_exists(&request.email).await? {
            return Err(AuthError::EmailTaken);
        }
        if self.accounts.username_exists(&request.username).await? {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;

        let verification = self.tokens.pending(EphemeralTokenKind::EmailVerification)?;

        let account = self
            .accounts
            .create_with_token(
                NewAccount {
                    email: request.email,
                    username: request.username,
                    first_name: request.first_name,
                    last_name: request.last_name,
                    password_hash,
                    role,
                },
                &verification,
            )
            .await?;

        if let Err(e) = self
            .with_timeout(self.notifier.send_verification(
                &account.email,
                &account.username,
                &verification.token,
            ))
            .await
        {
            warn!(account_id = account.id, error = %e, "Verification email not sent");
        }

        let pair = self.jwt.issue_pair(&account)?;
        info!(account_id = account.id, role = %role, "Account registered");

        Ok(AuthResponse::new(&account, pair))
    }

    /// Authenticate with email and password
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<AuthResponse> {
        let account = match self.accounts.find_by_email(&request.email).await {
            Ok(account) => account,
            Err(AccountError::NotFound) => {
                // Same Argon2 cost as a real check so response time does not reveal the email
                let _ = self.hasher.verify_decoy_blocking(request.password).await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        self.accounts
            .check_login_allowed(&account, &request.password, &self.hasher)
            .await?;

        if let Err(e) = self.accounts.touch_last_login(account.id).await {
            warn!(account_id = account.id, error = %e, "Failed to record last login");
        }

        let pair = self.jwt.issue_pair(&account)?;
        debug!(account_id = account.id, "Login succeeded");

        Ok(AuthResponse::new(&account, pair))
    }

    /// Redeem an email verification token
    pub async fn verify_email(&self, token: &str) -> AuthResult<VerifiedAccount> {
        let kind = EphemeralTokenKind::EmailVerification;
        let account_id = self.tokens.redeem(token, kind).await?;

        self.accounts.set_email_verified(account_id).await?;

        if let Err(e) = self.tokens.mark_used(token, kind).await {
            warn!(account_id, error = %e, "Failed to mark verification token used");
        }

        let account = self.accounts.find_by_id(account_id).await?;

        if let Err(e) = self
            .with_timeout(self.notifier.send_welcome(
                &account.email,
                &account.username,
                account.role,
            ))
            .await
        {
            warn!(account_id, error = %e, "Welcome email not sent");
        }

        info!(account_id, "Email verified");
        Ok(VerifiedAccount {
            user_id: account.id,
            email: account.email,
            username: account.username,
            email_verified: account.email_verified,
        })
    }

    /// Start a password reset
    ///
    /// Succeeds silently for unknown emails. For a known email the reset
    /// message must go out; a delivery failure is reported.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let account = match self.accounts.find_by_email(email).await {
            Ok(account) => account,
            Err(AccountError::NotFound) => {
                debug!("Password reset requested for unknown email");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let token = self.tokens.issue_reset(account.id).await?;

        self.with_timeout(
            self.notifier
                .send_reset(&account.email, &account.username, &token),
        )
        .await
        .map_err(|e| {
            error!(account_id = account.id, error = %e, "Password reset email failed");
            AuthError::NotificationFailed(e.to_string())
        })?;

        info!(account_id = account.id, "Password reset requested");
        Ok(())
    }

    /// Complete a password reset; returns the affected account id
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> AuthResult<i64> {
        if request.new_password != request.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let kind = EphemeralTokenKind::PasswordReset;
        let account_id = self.tokens.redeem(&request.token, kind).await?;

        let password_hash = self.hasher.hash_blocking(request.new_password).await?;
        self.accounts
            .set_password_hash(account_id, &password_hash)
            .await?;

        if let Err(e) = self.tokens.mark_used(&request.token, kind).await {
            warn!(account_id, error = %e, "Failed to mark reset token used");
        }

        info!(account_id, "Password reset completed");
        Ok(account_id)
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token is returned unchanged.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.jwt.validate_refresh(refresh_token)?;

        let account = match self.accounts.find_by_id(claims.user_id).await {
            Ok(account) => account,
            Err(AccountError::NotFound) => return Err(AuthError::Jwt(JwtError::Invalid)),
            Err(e) => return Err(e.into()),
        };
        if !account.status.is_active() {
            return Err(AuthError::AccountInactive);
        }

        let (access_token, expires_at) = self.jwt.issue_access(&account)?;
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.config().access_expiration_secs,
            expires_at,
        })
    }

    pub async fn profile(&self, account_id: i64) -> AuthResult<AccountView> {
        Ok(self.accounts.find_by_id(account_id).await?.view())
    }

    pub async fn update_profile(
        &self,
        account_id: i64,
        request: UpdateProfileRequest,
    ) -> AuthResult<AccountView> {
        if let Some(role) = request.role {
            if matches!(
                role,
                UserRole::Admin | UserRole::Moderator | UserRole::Buyer
            ) {
                return Err(AuthError::InvalidRole(role.to_string()));
            }
        }

        let patch = AccountPatch::from(request);
        Ok(self.accounts.update_fields(account_id, &patch).await?.view())
    }

    /// Registrable roles with display metadata
    pub fn roles(&self) -> Vec<RoleInfo> {
        UserRole::REGISTRABLE
            .iter()
            .map(|role| RoleInfo {
                value: *role,
                label: role.label().to_string(),
                description: role.description().to_string(),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub async fn list_accounts(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AuthResult<Vec<AccountView>> {
        let accounts = self.accounts.list(limit, offset).await?;
        Ok(accounts.iter().map(Account::view).collect())
    }

    pub async fn get_account(&self, account_id: i64) -> AuthResult<AccountView> {
        self.profile(account_id).await
    }

    /// Create an account on someone's behalf
    ///
    /// The account starts unverified and its owner is sent the usual
    /// verification link; no tokens are issued to the caller.
    pub async fn create_account(&self, request: CreateAccountRequest) -> AuthResult<AccountView> {
        if request.password != request.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        if self.accounts.email_exists(&request.email).await? {
            return Err(AuthError::EmailTaken);
        }
        if self.accounts.username_exists(&request.username).await? {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;
        let verification = self.tokens.pending(EphemeralTokenKind::EmailVerification)?;

        let account = self
            .accounts
            .create_with_token(
                NewAccount {
                    email: request.email,
                    username: request.username,
                    first_name: request.first_name,
                    last_name: request.last_name,
                    password_hash,
                    role: request.role,
                },
                &verification,
            )
            .await?;

        if let Err(e) = self
            .with_timeout(self.notifier.send_verification(
                &account.email,
                &account.username,
                &verification.token,
            ))
            .await
        {
            warn!(account_id = account.id, error = %e, "Verification email not sent");
        }

        Ok(account.view())
    }

    pub async fn update_account(
        &self,
        account_id: i64,
        request: UpdateAccountRequest,
    ) -> AuthResult<AccountView> {
        let patch = AccountPatch::from(request);
        Ok(self.accounts.update_fields(account_id, &patch).await?.view())
    }

    pub async fn deactivate_account(&self, account_id: i64) -> AuthResult<AccountView> {
        Ok(self.accounts.deactivate(account_id).await?.view())
    }

    async fn with_timeout<F>(&self, send: F) -> Result<(), NotifyError>
    where
        F: Future<Output = Result<(), NotifyError>>,
    {
        match tokio::time::timeout(self.notify_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.notify_timeout)),
        }
    }
}
