//! Credential store selection and PostgreSQL pool.
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Storage;
use crate::user::{CredentialStore, MemoryCredentialStore, PgCredentialStore};

pub const MEMORY_SCHEME: &str = "memory:";

/// Errors raised while opening the credential store.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("cannot connect to postgres: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Custom db structure to pass to Axum.
#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Init database connections.
    pub async fn new(config: &Storage) -> Result<Self, sqlx::Error> {
        let postgres = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect(&config.url)
            .await?;

        tracing::info!(pool_size = config.pool_size, "postgres connected");

        Ok(Self { postgres })
    }

    /// Execute migrations scripts.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.postgres).await
    }
}

/// Open the store named by `config.url`.
///
/// `memory:` keeps users in process. Anything else is a PostgreSQL URL.
pub async fn open(
    config: &Storage,
) -> Result<Arc<dyn CredentialStore>, DatabaseError> {
    if config.url.starts_with(MEMORY_SCHEME) {
        tracing::warn!("using in-memory credential store, users are lost on exit");
        return Ok(Arc::new(MemoryCredentialStore::new()));
    }

    let db = Database::new(config).await?;
    db.migrate().await?;

    Ok(Arc::new(PgCredentialStore::new(db.postgres)))
}
