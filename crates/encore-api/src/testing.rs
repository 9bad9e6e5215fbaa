//! In-memory application wiring for integration tests

use std::sync::Arc;

use axum::Router;
use encore_core::{AppConfig, UserRole};

use crate::auth::memory::{InMemoryAccountRepository, InMemoryTokenRepository};
use crate::auth::models::{Account, NewAccount};
use crate::auth::password::{CredentialHasher, PasswordConfig, PasswordPolicy};
use crate::auth::repository::AccountRepository;
use crate::clock::{Clock, ManualClock};
use crate::create_router;
use crate::notify::RecordingNotifier;
use crate::state::{AppState, Components};

/// Application state on in-memory stores, with handles to inspect them
pub struct TestContext {
    pub state: Arc<AppState>,
    pub accounts: Arc<InMemoryAccountRepository>,
    pub tokens: Arc<InMemoryTokenRepository>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub hasher: CredentialHasher,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let tokens = Arc::new(InMemoryTokenRepository::new());
        let accounts = Arc::new(InMemoryAccountRepository::with_token_store(tokens.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::default());
        let hasher = test_hasher();

        let components = Components {
            accounts: accounts.clone(),
            tokens: tokens.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
            hasher: hasher.clone(),
        };

        Self {
            state: Arc::new(AppState::new(config, components, None)),
            accounts,
            tokens,
            notifier,
            clock,
            hasher,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Store an active, verified admin account
    pub async fn seed_admin(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> anyhow::Result<Account> {
        let password_hash = self.hasher.hash(password)?;

        let now = self.clock.now();
        let account = self
            .accounts
            .insert(
                NewAccount {
                    email: email.to_string(),
                    username: username.to_string(),
                    first_name: "Site".to_string(),
                    last_name: "Admin".to_string(),
                    password_hash,
                    role: UserRole::Admin,
                },
                now,
            )
            .await?;
        self.accounts.set_email_verified(account.id, now).await?;

        self.accounts
            .find_by_id(account.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("seeded admin {email} vanished"))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Hasher with cheap Argon2 parameters
pub fn test_hasher() -> CredentialHasher {
    match CredentialHasher::new(PasswordPolicy::default(), &PasswordConfig::light()) {
        Ok(hasher) => hasher,
        Err(e) => panic!("light Argon2 parameters rejected: {e}"),
    }
}
