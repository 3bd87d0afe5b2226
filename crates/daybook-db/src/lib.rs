//! # daybook-db
//!
//! PostgreSQL store for daybook.
//!
//! This crate implements the store traits from `daybook-core` on a
//! connection pool:
//! - Transactional entry writes and annotation reconciliation
//! - Entry reads, listing, soft delete, and attachments
//! - Tag and person catalog management
//! - Owner preferences
//!
//! Catalog names are unique per owner ignoring case, enforced by a unique
//! index on `(owner_id, lower(name))`.

pub mod catalog;
pub mod entries;
pub mod pool;
pub mod preferences;
mod rows;
pub mod test_fixtures;
pub mod tx;

use std::sync::Arc;

pub use catalog::PgCatalogRepository;
pub use entries::PgEntryRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use preferences::PgPreferencesRepository;
pub use tx::{PgStore, PgStoreTx};

pub use daybook_core::{Error, Result};

/// Database handle exposing every repository on one pool.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Transactional write path.
    pub store: Arc<PgStore>,
    /// Entry reads and lifecycle.
    pub entries: Arc<PgEntryRepository>,
    /// Tag and person catalogs.
    pub catalog: Arc<PgCatalogRepository>,
    /// Owner preferences.
    pub preferences: Arc<PgPreferencesRepository>,
}

impl Database {
    /// Create a new database handle from a pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            store: Arc::new(PgStore::new(pool.clone())),
            entries: Arc::new(PgEntryRepository::new(pool.clone())),
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            preferences: Arc::new(PgPreferencesRepository::new(pool.clone())),
            pool,
        }
    }

    /// Connect to database with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
