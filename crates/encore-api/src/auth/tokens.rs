//! Single-use, time-bounded tokens for email verification and password reset
//!
//! Tokens are 32 random alphanumeric characters. A token is redeemable while
//! it is unconsumed and `now < expires_at`. Redemption and consumption are
//! separate steps: callers mark a token used only after the change it
//! authorizes has been stored.

use std::sync::Arc;

use chrono::Duration;
use encore_core::AuthConfig;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use thiserror::Error;
use tracing::debug;

use super::models::{EphemeralTokenKind, PendingToken};
use super::repository::{EphemeralTokenRepository, RepositoryError};
use crate::clock::Clock;

/// Length of generated tokens
pub const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum EphemeralTokenError {
    #[error("Invalid or already used token")]
    NotFound,

    #[error("Token has expired")]
    Expired,

    #[error("Token lifetime out of range")]
    TtlOutOfRange,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Lifetimes of each token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    pub verification: Duration,
    pub reset: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            verification: Duration::hours(24),
            reset: Duration::hours(1),
        }
    }
}

impl From<&AuthConfig> for TokenTtls {
    fn from(config: &AuthConfig) -> Self {
        Self {
            verification: seconds(config.verification_token_ttl_secs),
            reset: seconds(config.reset_token_ttl_secs),
        }
    }
}

// Saturates; an unrepresentable expiry is rejected when a token is issued.
fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

impl TokenTtls {
    pub fn for_kind(&self, kind: EphemeralTokenKind) -> Duration {
        match kind {
            EphemeralTokenKind::EmailVerification => self.verification,
            EphemeralTokenKind::PasswordReset => self.reset,
        }
    }
}

/// Issues and redeems ephemeral tokens
#[derive(Clone)]
pub struct EphemeralTokenStore {
    repo: Arc<dyn EphemeralTokenRepository>,
    clock: Arc<dyn Clock>,
    ttls: TokenTtls,
}

impl EphemeralTokenStore {
    pub fn new(
        repo: Arc<dyn EphemeralTokenRepository>,
        clock: Arc<dyn Clock>,
        ttls: TokenTtls,
    ) -> Self {
        Self { repo, clock, ttls }
    }

    pub async fn issue_reset(&self, account_id: i64) -> Result<String, EphemeralTokenError> {
        self.issue(EphemeralTokenKind::PasswordReset, account_id)
            .await
    }

    /// Generate and persist a new token for an account
    ///
    /// Earlier tokens of the same kind stay valid until they expire or are
    /// used.
    pub async fn issue(
        &self,
        kind: EphemeralTokenKind,
        account_id: i64,
    ) -> Result<String, EphemeralTokenError> {
        let pending = self.pending(kind)?;

        self.repo
            .insert(
                kind,
                account_id,
                &pending.token,
                pending.expires_at,
                self.clock.now(),
            )
            .await?;

        debug!(
            kind = %kind,
            account_id,
            expires_at = %pending.expires_at,
            "Issued ephemeral token"
        );
        Ok(pending.token)
    }

    /// Generate a token and its expiry without storing it
    ///
    /// For callers that persist the token together with other rows, such as
    /// registration writing the account and its verification token at once.
    pub fn pending(&self, kind: EphemeralTokenKind) -> Result<PendingToken, EphemeralTokenError> {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttls.for_kind(kind))
            .ok_or(EphemeralTokenError::TtlOutOfRange)?;

        Ok(PendingToken {
            kind,
            token: generate_token(),
            expires_at,
        })
    }

    /// Resolve a token to its account id without consuming it
    ///
    /// # Returns
    ///
    /// * `Ok(i64)` - Owning account id
    /// * `Err(EphemeralTokenError::NotFound)` - Unknown or already consumed
    /// * `Err(EphemeralTokenError::Expired)` - Found but past its expiry
    pub async fn redeem(
        &self,
        token: &str,
        kind: EphemeralTokenKind,
    ) -> Result<i64, EphemeralTokenError> {
        if token.is_empty() {
            return Err(EphemeralTokenError::NotFound);
        }

        let stored = self
            .repo
            .find_unconsumed(kind, token)
            .await?
            .ok_or(EphemeralTokenError::NotFound)?;

        if stored.is_expired_at(self.clock.now()) {
            return Err(EphemeralTokenError::Expired);
        }

        Ok(stored.user_id)
    }

    /// Consume a token; a second call finds nothing to consume
    pub async fn mark_used(
        &self,
        token: &str,
        kind: EphemeralTokenKind,
    ) -> Result<(), EphemeralTokenError> {
        if self
            .repo
            .mark_consumed(kind, token, self.clock.now())
            .await?
        {
            Ok(())
        } else {
            Err(EphemeralTokenError::NotFound)
        }
    }
}

/// 32 alphanumeric characters from the OS generator
pub fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
