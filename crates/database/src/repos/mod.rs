//! Database repository implementations

pub mod being_repository;
pub mod message_repository;

pub use being_repository::BeingRepository;
pub use message_repository::{MessageRepository, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
