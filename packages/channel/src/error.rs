use thiserror::Error;

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel unreachable: {0}")]
    Unavailable(String),
    #[error("Invalid channel config: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
