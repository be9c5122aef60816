//! Database layer for the veltra webhook delivery subsystem.
//!
//! Provides the connection pool wrapper, embedded migrations, and the
//! tenant-scoped models for webhook endpoints and their delivery ledger.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
