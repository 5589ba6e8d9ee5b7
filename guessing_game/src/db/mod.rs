//! PostgreSQL connection pool backing [`PgGameStore`].

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{GameError, GameResult};
use crate::store::PgGameStore;

pub mod config;

pub use config::DatabaseConfig;

/// Pool shared by every [`PgGameStore`] handed out by [`Database::store`]
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Validate `config` and open a pool
    ///
    /// # Errors
    ///
    /// * `GameError::InvalidArgument` - pool settings rejected by
    ///   [`DatabaseConfig::validate`]
    /// * `GameError::Unavailable` - database unreachable
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use guessing_game::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), guessing_game::GameError> {
    ///     let db = Database::connect(&DatabaseConfig::from_env()).await?;
    ///     db.store().ensure_schema().await?;
    ///     db.close().await;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &DatabaseConfig) -> GameResult<Self> {
        config.validate().map_err(GameError::InvalidArgument)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        log::info!(
            "Database pool open ({}..={} connections)",
            config.min_connections,
            config.max_connections
        );

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Game store over this pool
    pub fn store(&self) -> PgGameStore {
        PgGameStore::new(self.pool.clone())
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    /// Stores created from this database fail with `Unavailable` afterwards.
    pub async fn close(self) {
        self.pool.close().await;
        log::info!("Database pool closed");
    }
}
