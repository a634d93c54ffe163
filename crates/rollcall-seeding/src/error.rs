use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur within the seeding subsystem.
#[derive(Debug, Error)]
pub enum SeedingError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid scheduler configuration.
    #[error(transparent)]
    Config(#[from] rollcall_core::RollcallError),

    /// The seed primitive was handed a connection with no open transaction.
    #[error("seed must run inside a caller-owned transaction")]
    NotInTransaction,

    /// A thread panicked while holding the shared connection.
    #[error("connection mutex poisoned")]
    ConnectionPoisoned,

    /// The seed-request worker is gone (shut down or never started).
    #[error("seed request worker unavailable")]
    Unavailable,

    /// The blocking task running a seed request failed to complete.
    #[error("seed worker failed: {0}")]
    Worker(String),
}

impl SeedingError {
    /// Lock-wait and statement timeouts. These clear up on their own, so
    /// callers retry instead of alerting.
    pub fn is_transient(&self) -> bool {
        match self {
            SeedingError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::OperationInterrupted
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SeedingError>;
