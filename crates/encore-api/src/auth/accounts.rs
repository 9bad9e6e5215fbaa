//! Account lifecycle
//!
//! Two independent axes: email verification (`unverified -> verified`, never
//! back) and activity status (`active -> inactive` on delete). Login needs an
//! active, verified account with a matching password.

use std::sync::Arc;

use encore_core::{AccountPatch, AccountStatus};
use thiserror::Error;
use tracing::{debug, info};

use super::models::{Account, NewAccount, PendingToken};
use super::password::{CredentialHasher, PasswordError};
use super::repository::{AccountRepository, RepositoryError};
use crate::clock::Clock;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Account not found")]
    NotFound,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is not active")]
    Inactive,

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    #[error("Password check failed: {0}")]
    Password(PasswordError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AccountError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::EmailTaken => AccountError::EmailTaken,
            RepositoryError::UsernameTaken => AccountError::UsernameTaken,
            RepositoryError::NotFound => AccountError::NotFound,
            other => AccountError::Repository(other),
        }
    }
}

pub type AccountResult<T> = std::result::Result<T, AccountError>;

/// Clamp list paging: limit within 1..=100 (default 10), offset >= 0
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Owns account persistence and the login gate
#[derive(Clone)]
pub struct AccountManager {
    repo: Arc<dyn AccountRepository>,
    clock: Arc<dyn Clock>,
}

impl AccountManager {
    pub fn new(repo: Arc<dyn AccountRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn email_exists(&self, email: &str) -> AccountResult<bool> {
        Ok(self.repo.email_exists(email).await?)
    }

    pub async fn username_exists(&self, username: &str) -> AccountResult<bool> {
        Ok(self.repo.username_exists(username).await?)
    }

    /// Create an unverified, active account
    ///
    /// Email is checked before username. A concurrent insert that slips past
    /// the pre-checks is caught by the unique constraints and reported the
    /// same way.
    pub async fn create(&self, draft: NewAccount) -> AccountResult<Account> {
        self.ensure_available(&draft).await?;

        let account = self.repo.insert(draft, self.clock.now()).await?;
        info!(account_id = account.id, role = %account.role, "Account created");
        Ok(account)
    }

    /// `create`, storing `token` for the new account in the same write
    ///
    /// If the token cannot be stored the account is not created either, so
    /// the same email can register again.
    pub async fn create_with_token(
        &self,
        draft: NewAccount,
        token: &PendingToken,
    ) -> AccountResult<Account> {
        self.ensure_available(&draft).await?;

        let account = self
            .repo
            .insert_with_token(draft, token, self.clock.now())
            .await?;
        info!(
            account_id = account.id,
            role = %account.role,
            token_kind = %token.kind,
            "Account created"
        );
        Ok(account)
    }

    async fn ensure_available(&self, draft: &NewAccount) -> AccountResult<()> {
        if self.email_exists(&draft.email).await? {
            return Err(AccountError::EmailTaken);
        }
        if self.username_exists(&draft.username).await? {
            return Err(AccountError::UsernameTaken);
        }
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> AccountResult<Account> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn find_by_email(&self, email: &str) -> AccountResult<Account> {
        self.repo
            .find_by_email(email)
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn set_email_verified(&self, id: i64) -> AccountResult<()> {
        self.repo.set_email_verified(id, self.clock.now()).await?;
        Ok(())
    }

    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> AccountResult<()> {
        self.repo
            .set_password_hash(id, password_hash, self.clock.now())
            .await?;
        Ok(())
    }

    pub async fn touch_last_login(&self, id: i64) -> AccountResult<()> {
        self.repo.touch_last_login(id, self.clock.now()).await?;
        Ok(())
    }

    /// Apply a partial update
    ///
    /// A new email or username must not belong to another account.
    pub async fn update_fields(&self, id: i64, patch: &AccountPatch) -> AccountResult<Account> {
        let current = self.find_by_id(id).await?;

        if let Some(email) = patch.email.as_deref() {
            if email != current.email && self.email_exists(email).await? {
                return Err(AccountError::EmailTaken);
            }
        }
        if let Some(username) = patch.username.as_deref() {
            if username != current.username && self.username_exists(username).await? {
                return Err(AccountError::UsernameTaken);
            }
        }

        let updated = self.repo.apply_patch(id, patch, self.clock.now()).await?;
        debug!(account_id = id, "Account fields updated");
        Ok(updated)
    }

    /// Soft delete: the row stays, status becomes inactive
    pub async fn deactivate(&self, id: i64) -> AccountResult<Account> {
        let account = self
            .repo
            .apply_patch(
                id,
                &AccountPatch::status(AccountStatus::Inactive),
                self.clock.now(),
            )
            .await?;
        info!(account_id = id, "Account deactivated");
        Ok(account)
    }

    pub async fn list(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AccountResult<Vec<Account>> {
        let (limit, offset) = page_bounds(limit, offset);
        Ok(self.repo.list(limit, offset).await?)
    }

    /// Login gate: active status, then password, then verified email
    ///
    /// A wrong password reports the same error as an unknown email.
    pub async fn check_login_allowed(
        &self,
        account: &Account,
        password: &str,
        hasher: &CredentialHasher,
    ) -> AccountResult<()> {
        if !account.status.is_active() {
            return Err(AccountError::Inactive);
        }

        match hasher
            .verify_blocking(account.password_hash.clone(), password.to_string())
            .await
        {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => return Err(AccountError::InvalidCredentials),
            Err(e) => return Err(AccountError::Password(e)),
        }

        if !account.email_verified {
            return Err(AccountError::EmailNotVerified);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::{InMemoryAccountRepository, InMemoryTokenRepository};
    use crate::auth::models::EphemeralTokenKind;
    use crate::auth::password::{PasswordConfig, PasswordPolicy};
    use crate::clock::ManualClock;
    use chrono::{Duration, Utc};
    use encore_core::UserRole;

    fn manager() -> (AccountManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = AccountManager::new(Arc::new(InMemoryAccountRepository::new()), clock.clone());
        (manager, clock)
    }

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(PasswordPolicy::default(), &PasswordConfig::light()).unwrap()
    }

    fn draft(email: &str, username: &str, password_hash: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            password_hash: password_hash.to_string(),
            role: UserRole::Fan,
        }
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (10, 0));
        assert_eq!(page_bounds(Some(0), Some(-5)), (1, 0));
        assert_eq!(page_bounds(Some(500), Some(20)), (100, 20));
        assert_eq!(page_bounds(Some(25), None), (25, 0));
    }

    #[tokio::test]
    async fn test_create_reports_email_before_username() {
        let (manager, _) = manager();
        let account = manager
            .create(draft("alice@example.com", "alice", "hash"))
            .await
            .unwrap();
        assert!(!account.email_verified);
        assert_eq!(account.status, AccountStatus::Active);

        assert!(matches!(
            manager
                .create(draft("alice@example.com", "alice", "hash"))
                .await,
            Err(AccountError::EmailTaken)
        ));
        assert!(matches!(
            manager
                .create(draft("other@example.com", "alice", "hash"))
                .await,
            Err(AccountError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn test_create_with_token_stores_both_rows() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tokens = Arc::new(InMemoryTokenRepository::new());
        let manager = AccountManager::new(
            Arc::new(InMemoryAccountRepository::with_token_store(tokens.clone())),
            clock.clone(),
        );
        let pending = PendingToken {
            kind: EphemeralTokenKind::EmailVerification,
            token: "tok".to_string(),
            expires_at: clock.now() + Duration::hours(24),
        };

        let account = manager
            .create_with_token(draft("alice@example.com", "alice", "hash"), &pending)
            .await
            .unwrap();
        let stored = tokens.tokens_for(pending.kind, account.id).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token, "tok");

        assert!(matches!(
            manager
                .create_with_token(draft("alice@example.com", "other", "hash"), &pending)
                .await,
            Err(AccountError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn test_update_fields_checks_other_accounts() {
        let (manager, clock) = manager();
        let alice = manager
            .create(draft("alice@example.com", "alice", "hash"))
            .await
            .unwrap();
        manager
            .create(draft("bob@example.com", "bob", "hash"))
            .await
            .unwrap();

        let taken = AccountPatch {
            email: Some("bob@example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            manager.update_fields(alice.id, &taken).await,
            Err(AccountError::EmailTaken)
        ));

        // Re-submitting one's own username is not a conflict
        clock.advance(Duration::seconds(30));
        let same = AccountPatch {
            username: Some("alice".to_string()),
            last_name: Some("Smith".to_string()),
            ..Default::default()
        };
        let updated = manager.update_fields(alice.id, &same).await.unwrap();
        assert_eq!(updated.last_name, "Smith");
        assert!(updated.updated_at > alice.updated_at);

        assert!(matches!(
            manager.update_fields(999, &same).await,
            Err(AccountError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_deactivate_hides_account_from_list() {
        let (manager, _) = manager();
        let alice = manager
            .create(draft("alice@example.com", "alice", "hash"))
            .await
            .unwrap();

        let deactivated = manager.deactivate(alice.id).await.unwrap();
        assert_eq!(deactivated.status, AccountStatus::Inactive);
        assert!(manager.list(None, None).await.unwrap().is_empty());
        // Still retrievable by id
        assert!(manager.find_by_id(alice.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_gate_order() {
        let (manager, _) = manager();
        let hasher = hasher();
        let hash = hasher.hash("Str0ngPass").unwrap();
        let alice = manager
            .create(draft("alice@example.com", "alice", &hash))
            .await
            .unwrap();

        assert!(matches!(
            manager
                .check_login_allowed(&alice, "Wr0ngPass", &hasher)
                .await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            manager
                .check_login_allowed(&alice, "Str0ngPass", &hasher)
                .await,
            Err(AccountError::EmailNotVerified)
        ));

        manager.set_email_verified(alice.id).await.unwrap();
        let verified = manager.find_by_id(alice.id).await.unwrap();
        assert!(manager
            .check_login_allowed(&verified, "Str0ngPass", &hasher)
            .await
            .is_ok());

        let inactive = manager.deactivate(alice.id).await.unwrap();
        assert!(matches!(
            manager
                .check_login_allowed(&inactive, "Str0ngPass", &hasher)
                .await,
            Err(AccountError::Inactive)
        ));
    }

    #[tokio::test]
    async fn test_touch_last_login_uses_clock() {
        let (manager, clock) = manager();
        let alice = manager
            .create(draft("alice@example.com", "alice", "hash"))
            .await
            .unwrap();
        assert!(alice.last_login_at.is_none());

        clock.advance(Duration::minutes(3));
        manager.touch_last_login(alice.id).await.unwrap();
        let reloaded = manager.find_by_id(alice.id).await.unwrap();
        assert_eq!(reloaded.last_login_at, Some(clock.now()));
    }
}
