//! Matricula Store - SQLite record store
//!
//! SQLite-based persistence for:
//! - Enrollment records (with a version column for compare-and-swap)
//! - The append-only enrollment history
//! - The reconciliation queue
//!
//! ## Architecture
//!
//! This crate implements the `IPersistenceGateway` port from `matricula-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteEnrollmentGateway`] - Full `IPersistenceGateway` implementation
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use matricula_store::{DatabasePool, SqliteEnrollmentGateway};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/matricula/matricula.db")).await?;
//! let gateway = SqliteEnrollmentGateway::new(pool.pool().clone());
//! // Use gateway as IPersistenceGateway...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

use matricula_core::ports::GatewayError;

pub use pool::DatabasePool;
pub use repository::SqliteEnrollmentGateway;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The database was locked by another writer past the busy timeout
    #[error("Database busy: {0}")]
    Busy(String),

    /// A write violated a table constraint or trigger
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be converted to a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// SQLite primary result codes for a locked database
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => {
                let primary = db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => {
                        StoreError::Busy(db.message().to_string())
                    }
                    _ => StoreError::ConstraintViolation(db.message().to_string()),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::ConnectionFailed(e.to_string())
            }
            _ => StoreError::QueryFailed(e.to_string()),
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation(msg) | StoreError::SerializationError(msg) => {
                GatewayError::Rejected(msg)
            }
            other => GatewayError::Unavailable(other.to_string()),
        }
    }
}
