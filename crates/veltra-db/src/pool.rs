//! Connection pool wrapper around `sqlx::PgPool`.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Wrapper around a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect to the database and verify the connection.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if the pool cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        Ok(Self { inner })
    }

    /// Create a pool without connecting eagerly.
    ///
    /// Connections are established on first use. Useful for tests and for
    /// services that must start before the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if the URL cannot be parsed.
    pub fn connect_lazy(database_url: &str) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(database_url)
            .map_err(DbError::ConnectionFailed)?;

        Ok(Self { inner })
    }

    /// Access the underlying `sqlx` pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }
}
