use thiserror::Error;

pub type LogResult<T> = Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("log unavailable: {0}")]
    Unavailable(String),
    #[error("consumer group '{0}' does not exist")]
    UnknownGroup(String),
    #[error("malformed log entry: {0}")]
    Malformed(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
