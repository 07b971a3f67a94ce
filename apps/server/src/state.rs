//! Shared application state

use crate::{
    config::{Config, StorageBackend},
    db::{MemoryRecordStore, PostgresRecordStore, RecordStore},
    models::Record,
    realtime::ConnectionManager,
    services::{CrudService, RideService, UserService},
    Result,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppStateOptions {
    /// Apply pending migrations before serving. Ignored by the memory backend.
    pub run_migrations: bool,
}

impl Default for AppStateOptions {
    fn default() -> Self {
        Self {
            run_migrations: true,
        }
    }
}

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    /// Present only for the Postgres backend.
    pub db_pool: Option<PgPool>,
    pub realtime: Arc<ConnectionManager>,
    pub user_service: Arc<UserService>,
    pub ride_service: Arc<RideService>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let run_migrations = config.database.run_migrations;
        Self::new_with_options(config, AppStateOptions { run_migrations }).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> Result<Self> {
        tracing::info!(backend = ?config.database.backend, "Initializing application state...");

        let (store, db_pool): (Arc<dyn RecordStore>, Option<PgPool>) =
            match config.database.backend {
                StorageBackend::Postgres => {
                    let pool = create_db_pool(&config).await?;
                    if options.run_migrations {
                        tracing::info!("Running database migrations...");
                        sqlx::migrate!("./migrations").run(&pool).await?;
                    }
                    (Arc::new(PostgresRecordStore::new(pool.clone())), Some(pool))
                }
                StorageBackend::Memory => {
                    tracing::warn!("Using in-memory storage; data will not survive a restart");
                    (Arc::new(MemoryRecordStore::new()), None)
                }
            };

        let state = Self::with_store(config, store, db_pool);
        tracing::info!("Application state initialized");
        Ok(state)
    }

    /// Assemble the state around an already constructed store.
    pub fn with_store(config: Config, store: Arc<dyn RecordStore>, db_pool: Option<PgPool>) -> Self {
        let realtime = Arc::new(ConnectionManager::new());
        let push = config.realtime.enabled.then(|| realtime.clone());

        Self {
            user_service: Arc::new(UserService::new(store.clone())),
            ride_service: Arc::new(RideService::new(store.clone(), push)),
            config: Arc::new(config),
            store,
            db_pool,
            realtime,
        }
    }

    /// Generic CRUD over one record type.
    pub fn crud<R: Record>(&self) -> CrudService<R> {
        CrudService::new(self.store.clone())
    }
}

async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;
    let lock_timeout = config.database.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;

                // Fail fast instead of queueing behind a stuck ride row.
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect(&config.database.url)
        .await
        .map_err(crate::Error::Database)?;

    tracing::info!(
        "Database pool created (min: {}, max: {})",
        config.database.pool_min_size,
        config.database.pool_max_size
    );

    Ok(pool)
}
