//! PostgreSQL infrastructure adapters implementing the database ports.

pub mod repositories;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

pub use repositories::accounts::PostgresAccountRepository;
pub use repositories::areas::PostgresAreaRepository;
pub use repositories::devices::PostgresDeviceRepository;

use crate::error::{FleetError, Result};

/// Statistics about the connection pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_size: u32,
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    max_connections: u32,
    accounts: Arc<PostgresAccountRepository>,
    areas: Arc<PostgresAreaRepository>,
    devices: Arc<PostgresDeviceRepository>,
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl PostgresDatabase {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(connection_string)
            .await
            .map_err(|e| FleetError::Store(format!("Failed to connect to database: {e}")))?;

        info!(max_connections, "database pool initialized");
        Ok(Self::from_pool(pool, max_connections))
    }

    pub fn from_pool(pool: PgPool, max_connections: u32) -> Self {
        Self {
            accounts: Arc::new(PostgresAccountRepository::new(pool.clone())),
            areas: Arc::new(PostgresAreaRepository::new(pool.clone())),
            devices: Arc::new(PostgresDeviceRepository::new(pool.clone())),
            pool,
            max_connections,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| FleetError::Store(format!("Failed to run migrations: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn accounts(&self) -> Arc<PostgresAccountRepository> {
        Arc::clone(&self.accounts)
    }

    pub fn areas(&self) -> Arc<PostgresAreaRepository> {
        Arc::clone(&self.areas)
    }

    pub fn devices(&self) -> Arc<PostgresDeviceRepository> {
        Arc::clone(&self.devices)
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX),
            max_size: self.max_connections,
        }
    }
}
