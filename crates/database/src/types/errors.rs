//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::Duplicate(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(error.to_string())
            }
            _ => DatabaseError::QueryError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(error: serde_json::Error) -> Self {
        DatabaseError::CorruptRecord(format!("invalid json column: {error}"))
    }
}

impl From<chrono::ParseError> for DatabaseError {
    fn from(error: chrono::ParseError) -> Self {
        DatabaseError::CorruptRecord(format!("invalid timestamp: {error}"))
    }
}
