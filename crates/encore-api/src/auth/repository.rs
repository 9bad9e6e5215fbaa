//! Account and ephemeral-token persistence
//!
//! Repository traits used by the auth core, with PostgreSQL implementations.
//! Uniqueness of email and username is enforced by named unique constraints;
//! violations come back as [`RepositoryError::EmailTaken`] or
//! [`RepositoryError::UsernameTaken`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use encore_core::{AccountPatch, AccountStatus, UserRole};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{Executor, FromRow};
use thiserror::Error;

use super::models::{Account, EphemeralToken, EphemeralTokenKind, NewAccount, PendingToken};

/// Persistence errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Record not found")]
    NotFound,

    #[error("Stored row is invalid: {0}")]
    CorruptRow(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                match db.constraint() {
                    Some(EMAIL_CONSTRAINT) => return RepositoryError::EmailTaken,
                    Some(USERNAME_CONSTRAINT) => return RepositoryError::UsernameTaken,
                    _ => {}
                }
            }
        }
        RepositoryError::Database(err.to_string())
    }
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

const EMAIL_CONSTRAINT: &str = "users_email_key";
const USERNAME_CONSTRAINT: &str = "users_username_key";

/// Account storage
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Exact-match email lookup
    async fn email_exists(&self, email: &str) -> RepositoryResult<bool>;

    async fn username_exists(&self, username: &str) -> RepositoryResult<bool>;

    /// Insert an unverified, active account
    async fn insert(&self, account: NewAccount, now: DateTime<Utc>) -> RepositoryResult<Account>;

    /// Insert an unverified, active account and a token for it atomically
    ///
    /// Either both rows are written or neither is.
    async fn insert_with_token(
        &self,
        account: NewAccount,
        token: &PendingToken,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Account>;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Account>>;

    /// Mark the email verified; `NotFound` if no such account
    async fn set_email_verified(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()>;

    async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    async fn touch_last_login(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()>;

    /// Apply the provided fields of `patch` and bump `updated_at`
    async fn apply_patch(
        &self,
        id: i64,
        patch: &AccountPatch,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Account>;

    /// Accounts that are not inactive, oldest first
    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Account>>;
}

/// Single-use token storage
#[async_trait]
pub trait EphemeralTokenRepository: Send + Sync {
    async fn insert(
        &self,
        kind: EphemeralTokenKind,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// Exact-match lookup among tokens that were never consumed
    async fn find_unconsumed(
        &self,
        kind: EphemeralTokenKind,
        token: &str,
    ) -> RepositoryResult<Option<EphemeralToken>>;

    /// Set the consumed timestamp; returns false if nothing was updated
    async fn mark_consumed(
        &self,
        kind: EphemeralTokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

const ACCOUNT_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, \
     role, status, email_verified, last_login_at, created_at, updated_at";

/// Account row from database
#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
    status: String,
    email_verified: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role: UserRole = row
            .role
            .parse()
            .map_err(|e: encore_core::CoreError| RepositoryError::CorruptRow(e.to_string()))?;
        let status: AccountStatus = row
            .status
            .parse()
            .map_err(|e: encore_core::CoreError| RepositoryError::CorruptRow(e.to_string()))?;

        Ok(Account {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            role,
            status,
            email_verified: row.email_verified,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL account store
#[derive(Debug, Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        value: &str,
    ) -> RepositoryResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE {clause} = $1");
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }
}

async fn insert_account<'e, E>(
    executor: E,
    account: &NewAccount,
    now: DateTime<Utc>,
) -> RepositoryResult<AccountRow>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password_hash,
                           role, status, email_verified, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $8)
        RETURNING {ACCOUNT_COLUMNS}
        "#
    );

    let row = sqlx::query_as(&sql)
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(AccountStatus::Active.as_str())
        .bind(now)
        .fetch_one(executor)
        .await?;

    Ok(row)
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn email_exists(&self, email: &str) -> RepositoryResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> RepositoryResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert(&self, account: NewAccount, now: DateTime<Utc>) -> RepositoryResult<Account> {
        let row = insert_account(&self.pool, &account, now).await?;
        Account::try_from(row)
    }

    async fn insert_with_token(
        &self,
        account: NewAccount,
        token: &PendingToken,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Account> {
        let mut tx = self.pool.begin().await?;

        let row = insert_account(&mut *tx, &account, now).await?;
        sqlx::query(queries_for(token.kind).insert)
            .bind(row.id)
            .bind(&token.token)
            .bind(token.expires_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Account::try_from(row)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1");
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Account>> {
        self.fetch_one_where("email", email).await
    }

    async fn set_email_verified(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn apply_patch(
        &self,
        id: i64,
        patch: &AccountPatch,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Account> {
        // Absent fields bind NULL and keep their column value.
        let sql = format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                username = COALESCE($3, username),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                role = COALESCE($6, role),
                status = COALESCE($7, status),
                updated_at = $8
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );

        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(patch.email.as_deref())
            .bind(patch.username.as_deref())
            .bind(patch.first_name.as_deref())
            .bind(patch.last_name.as_deref())
            .bind(patch.role.map(|r| r.as_str()))
            .bind(patch.status.map(|s| s.as_str()))
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(RepositoryError::NotFound)
            .and_then(Account::try_from)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE status <> 'inactive' \
             ORDER BY id LIMIT $1 OFFSET $2"
        );
        let rows: Vec<AccountRow> = sqlx::query_as(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Account::try_from).collect()
    }
}

/// Statements for one token table
struct TokenQueries {
    insert: &'static str,
    find_unconsumed: &'static str,
    mark_consumed: &'static str,
}

const VERIFICATION_QUERIES: TokenQueries = TokenQueries {
    insert: "INSERT INTO email_verifications (user_id, token, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
    find_unconsumed: "SELECT id, user_id, token, expires_at, verified_at AS consumed_at, created_at \
                      FROM email_verifications WHERE token = $1 AND verified_at IS NULL",
    mark_consumed: "UPDATE email_verifications SET verified_at = $2 \
                    WHERE token = $1 AND verified_at IS NULL",
};

const RESET_QUERIES: TokenQueries = TokenQueries {
    insert: "INSERT INTO password_resets (user_id, token, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
    find_unconsumed: "SELECT id, user_id, token, expires_at, used_at AS consumed_at, created_at \
                      FROM password_resets WHERE token = $1 AND used_at IS NULL",
    mark_consumed: "UPDATE password_resets SET used_at = $2 WHERE token = $1 AND used_at IS NULL",
};

fn queries_for(kind: EphemeralTokenKind) -> &'static TokenQueries {
    match kind {
        EphemeralTokenKind::EmailVerification => &VERIFICATION_QUERIES,
        EphemeralTokenKind::PasswordReset => &RESET_QUERIES,
    }
}

#[derive(Debug, FromRow)]
struct TokenRow {
    id: i64,
    user_id: i64,
    token: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TokenRow {
    fn into_token(self, kind: EphemeralTokenKind) -> EphemeralToken {
        EphemeralToken {
            id: self.id,
            user_id: self.user_id,
            kind,
            token: self.token,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL store for verification and reset tokens
#[derive(Debug, Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EphemeralTokenRepository for PgTokenRepository {
    async fn insert(
        &self,
        kind: EphemeralTokenKind,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        sqlx::query(queries_for(kind).insert)
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_unconsumed(
        &self,
        kind: EphemeralTokenKind,
        token: &str,
    ) -> RepositoryResult<Option<EphemeralToken>> {
        let row: Option<TokenRow> = sqlx::query_as(queries_for(kind).find_unconsumed)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_token(kind)))
    }

    async fn mark_consumed(
        &self,
        kind: EphemeralTokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(queries_for(kind).mark_consumed)
            .bind(token)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
