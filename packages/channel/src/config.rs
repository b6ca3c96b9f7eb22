//! Channel backend selection.

use std::sync::Arc;

use crate::{
    ChannelError, MemoryChannel, RedisChannel, RedisConfig, SurrealChannel, SurrealConfig,
    WorkChannel,
};

/// Redis list the generation worker drains.
pub const TASK_QUEUE: &str = "video_generation_tasks";

/// Redis list the generation worker appends results to.
pub const RESULT_QUEUE: &str = "video_generation_results";

/// Which backend carries the task and result channels.
#[derive(Debug, Clone)]
pub enum ChannelConfig {
    /// In-process lists; the generation worker must run in the same process.
    Memory,
    Surreal(SurrealConfig),
    Redis(RedisConfig),
}

impl ChannelConfig {
    /// Parse a backend name as used in configuration (`memory`, `surreal`, `redis`).
    pub fn from_kind(
        kind: &str,
        redis_url: Option<String>,
        surreal_endpoint: Option<String>,
    ) -> Result<Self, ChannelError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "surreal" | "surrealdb" => Ok(Self::Surreal(
                surreal_endpoint
                    .map(SurrealConfig::from_endpoint)
                    .unwrap_or_default(),
            )),
            "redis" => Ok(Self::Redis(
                redis_url.map(RedisConfig::new).unwrap_or_default(),
            )),
            other => Err(ChannelError::InvalidConfig(format!(
                "unknown channel backend {other:?} (expected memory, surreal or redis)"
            ))),
        }
    }

    /// Adjust the SurrealDB settings; other backends are returned unchanged.
    pub fn map_surreal(self, f: impl FnOnce(SurrealConfig) -> SurrealConfig) -> Self {
        match self {
            Self::Surreal(config) => Self::Surreal(f(config)),
            other => other,
        }
    }
}

/// Build the configured channel.
///
/// Failing here is fatal: the dispatcher cannot start without its channels.
pub async fn connect(config: ChannelConfig) -> Result<Arc<dyn WorkChannel>, ChannelError> {
    let channel: Arc<dyn WorkChannel> = match config {
        ChannelConfig::Memory => Arc::new(MemoryChannel::new()),
        ChannelConfig::Surreal(config) => Arc::new(SurrealChannel::connect(config).await?),
        ChannelConfig::Redis(config) => Arc::new(RedisChannel::connect(config).await?),
    };
    tracing::info!("Using {} work channel", channel.backend());
    Ok(channel)
}
