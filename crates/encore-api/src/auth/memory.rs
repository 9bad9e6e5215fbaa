//! In-memory repositories for tests
//!
//! Behave like the PostgreSQL stores, including the unique constraints on
//! email and username.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use encore_core::{AccountPatch, AccountStatus};
use tokio::sync::RwLock;

use super::models::{Account, EphemeralToken, EphemeralTokenKind, NewAccount, PendingToken};
use super::repository::{
    AccountRepository, EphemeralTokenRepository, RepositoryError, RepositoryResult,
};

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<Vec<Account>>,
    /// Token store written by `insert_with_token`
    linked_tokens: Option<Arc<dyn EphemeralTokenRepository>>,
}

impl std::fmt::Debug for InMemoryAccountRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAccountRepository")
            .field("linked_tokens", &self.linked_tokens.is_some())
            .finish_non_exhaustive()
    }
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository whose `insert_with_token` also writes to `tokens`
    pub fn with_token_store(tokens: Arc<dyn EphemeralTokenRepository>) -> Self {
        Self {
            accounts: RwLock::default(),
            linked_tokens: Some(tokens),
        }
    }

    /// Snapshot of every stored account, in insertion order
    pub async fn all(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }

    /// Overwrite a stored account, e.g. to seed an admin
    pub async fn put(&self, account: Account) {
        let mut accounts = self.accounts.write().await;
        match accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account,
            None => accounts.push(account),
        }
    }
}

fn conflict_with(
    accounts: &[Account],
    id: i64,
    email: &str,
    username: &str,
) -> Option<RepositoryError> {
    if accounts.iter().any(|a| a.id != id && a.email == email) {
        return Some(RepositoryError::EmailTaken);
    }
    if accounts.iter().any(|a| a.id != id && a.username == username) {
        return Some(RepositoryError::UsernameTaken);
    }
    None
}

fn push_account(
    accounts: &mut Vec<Account>,
    account: NewAccount,
    now: DateTime<Utc>,
) -> RepositoryResult<Account> {
    if let Some(conflict) = conflict_with(accounts, 0, &account.email, &account.username) {
        return Err(conflict);
    }

    let id = accounts.iter().map(|a| a.id).max().unwrap_or(0) + 1;
    let stored = Account {
        id,
        email: account.email,
        username: account.username,
        first_name: account.first_name,
        last_name: account.last_name,
        password_hash: account.password_hash,
        role: account.role,
        status: AccountStatus::Active,
        email_verified: false,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    accounts.push(stored.clone());
    Ok(stored)
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn email_exists(&self, email: &str) -> RepositoryResult<bool> {
        Ok(self.accounts.read().await.iter().any(|a| a.email == email))
    }

    async fn username_exists(&self, username: &str) -> RepositoryResult<bool> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .any(|a| a.username == username))
    }

    async fn insert(&self, account: NewAccount, now: DateTime<Utc>) -> RepositoryResult<Account> {
        let mut accounts = self.accounts.write().await;
        push_account(&mut accounts, account, now)
    }

    async fn insert_with_token(
        &self,
        account: NewAccount,
        token: &PendingToken,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Account> {
        let tokens = self
            .linked_tokens
            .as_ref()
            .ok_or_else(|| RepositoryError::Database("no token store linked".to_string()))?;

        // Held across the token write so no one observes the account alone
        let mut accounts = self.accounts.write().await;
        let stored = push_account(&mut accounts, account, now)?;

        if let Err(e) = tokens
            .insert(token.kind, stored.id, &token.token, token.expires_at, now)
            .await
        {
            accounts.retain(|a| a.id != stored.id);
            return Err(e);
        }

        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn set_email_verified(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        account.email_verified = true;
        account.updated_at = now;
        Ok(())
    }

    async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        account.password_hash = password_hash.to_string();
        account.updated_at = now;
        Ok(())
    }

    async fn touch_last_login(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        account.last_login_at = Some(now);
        account.updated_at = now;
        Ok(())
    }

    async fn apply_patch(
        &self,
        id: i64,
        patch: &AccountPatch,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Account> {
        let mut accounts = self.accounts.write().await;
        let current = accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        let email = patch.email.clone().unwrap_or(current.email);
        let username = patch.username.clone().unwrap_or(current.username);
        if let Some(conflict) = conflict_with(&accounts, id, &email, &username) {
            return Err(conflict);
        }

        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        account.email = email;
        account.username = username;
        if let Some(first_name) = &patch.first_name {
            account.first_name = first_name.clone();
        }
        if let Some(last_name) = &patch.last_name {
            account.last_name = last_name.clone();
        }
        if let Some(role) = patch.role {
            account.role = role;
        }
        if let Some(status) = patch.status {
            account.status = status;
        }
        account.updated_at = now;
        Ok(account.clone())
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Account>> {
        let skip = usize::try_from(offset).unwrap_or(0);
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .filter(|a| a.status != AccountStatus::Inactive)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTokenRepository {
    tokens: RwLock<Vec<EphemeralToken>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every token of `kind` issued to `user_id`, consumed or not
    pub async fn tokens_for(&self, kind: EphemeralTokenKind, user_id: i64) -> Vec<EphemeralToken> {
        self.tokens
            .read()
            .await
            .iter()
            .filter(|t| t.kind == kind && t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn count(&self, kind: EphemeralTokenKind) -> usize {
        self.tokens
            .read()
            .await
            .iter()
            .filter(|t| t.kind == kind)
            .count()
    }
}

#[async_trait]
impl EphemeralTokenRepository for InMemoryTokenRepository {
    async fn insert(
        &self,
        kind: EphemeralTokenKind,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.iter().any(|t| t.kind == kind && t.token == token) {
            return Err(RepositoryError::Database(
                "duplicate ephemeral token".to_string(),
            ));
        }

        let id = tokens.len() as i64 + 1;
        tokens.push(EphemeralToken {
            id,
            user_id,
            kind,
            token: token.to_string(),
            expires_at,
            consumed_at: None,
            created_at: now,
        });
        Ok(())
    }

    async fn find_unconsumed(
        &self,
        kind: EphemeralTokenKind,
        token: &str,
    ) -> RepositoryResult<Option<EphemeralToken>> {
        Ok(self
            .tokens
            .read()
            .await
            .iter()
            .find(|t| t.kind == kind && t.token == token && !t.is_consumed())
            .cloned())
    }

    async fn mark_consumed(
        &self,
        kind: EphemeralTokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let mut tokens = self.tokens.write().await;
        match tokens
            .iter_mut()
            .find(|t| t.kind == kind && t.token == token && !t.is_consumed())
        {
            Some(stored) => {
                stored.consumed_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
