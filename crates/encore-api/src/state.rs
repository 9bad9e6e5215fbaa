//! Application state management

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use encore_core::config::AppConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use crate::auth::accounts::AccountManager;
use crate::auth::jwt::JwtService;
use crate::auth::password::{CredentialHasher, PasswordConfig, PasswordPolicy};
use crate::auth::repository::{
    AccountRepository, EphemeralTokenRepository, PgAccountRepository, PgTokenRepository,
};
use crate::auth::service::AuthService;
use crate::auth::tokens::{EphemeralTokenStore, TokenTtls};
use crate::clock::{Clock, SystemClock};
use crate::notify::{LogNotifier, MessageLinks, Notifier, SmtpNotifier};

/// Application state shared across handlers
pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthService,
    /// Absent when running on in-memory stores
    pub db_pool: Option<PgPool>,
    pub start_time: Instant,
    pub is_ready: AtomicBool,
}

/// Collaborators the auth service is built from
pub struct Components {
    pub accounts: Arc<dyn AccountRepository>,
    pub tokens: Arc<dyn EphemeralTokenRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub hasher: CredentialHasher,
}

impl AppState {
    /// Wire the auth service from its collaborators
    pub fn new(config: AppConfig, components: Components, db_pool: Option<PgPool>) -> Self {
        let jwt = Arc::new(JwtService::from_settings(&config.jwt));
        let accounts = AccountManager::new(components.accounts, components.clock.clone());
        let tokens = EphemeralTokenStore::new(
            components.tokens,
            components.clock,
            TokenTtls::from(&config.auth),
        );

        let auth = AuthService::new(
            accounts,
            tokens,
            components.hasher,
            jwt,
            components.notifier,
            Duration::from_secs(config.email.timeout_secs),
        );

        Self {
            config,
            auth,
            db_pool,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Connect to PostgreSQL, run migrations and build production state
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let db = &config.database;
        let pool = PgPoolOptions::new()
            .max_connections(db.pool_size)
            .acquire_timeout(Duration::from_secs(db.acquire_timeout_secs))
            .connect(&db.postgres_url)
            .await
            .context("PostgreSQL connection failed")?;
        info!(pool_size = db.pool_size, "Connected to PostgreSQL");

        if db.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Database migration failed")?;
            info!("Database migrations applied");
        }

        let links = MessageLinks::from(&config.auth);
        let notifier: Arc<dyn Notifier> = if config.email.enabled {
            Arc::new(SmtpNotifier::new(&config.email, links)?)
        } else {
            warn!("Email delivery disabled, notifications will only be logged");
            Arc::new(LogNotifier::new(links))
        };

        let hasher = CredentialHasher::new(PasswordPolicy::default(), &PasswordConfig::default())?;

        let components = Components {
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            tokens: Arc::new(PgTokenRepository::new(pool.clone())),
            notifier,
            clock: Arc::new(SystemClock),
            hasher,
        };

        Ok(Self::new(config, components, Some(pool)))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Round-trip to the database; true when no database is configured
    pub async fn database_reachable(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            None => true,
        }
    }
}
