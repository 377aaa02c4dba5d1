//! RelayHub Database Crate
//!
//! Record store for beings and messages: connection management, embedded
//! migrations, and repositories that only ever apply field-level updates.

use relayhub_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::{ping, prepare_database};
pub use migrations::run_migrations;

pub use repos::{BeingRepository, MessageRepository};

pub use entities::{
    Attachment, Being, BeingStatus, CreateBeingRequest, Message, MessagePriority, MessageQuery,
    MessageStatus, BROADCAST_RECIPIENT,
};

pub use types::{current_timestamp, errors::DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
