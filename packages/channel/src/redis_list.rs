//! Redis list channels, the format the generation worker consumes.
//!
//! Both channels are plain lists of JSON records: jobs are `RPUSH`ed onto the
//! task list, results are read with `LRANGE` and consumed with `LREM` using
//! the exact serialized value, so removal targets the entry observed in the
//! snapshot rather than whatever sits at its former index.

use std::fmt;

use futures_util::FutureExt;
use motion_core::{GenerationJob, GenerationResult};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::{RESULT_QUEUE, TASK_QUEUE};
use crate::{ChannelEntry, ChannelError, ChannelFuture, WorkChannel};

/// Redis channel configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub task_key: String,
    pub result_key: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            task_key: TASK_QUEUE.to_string(),
            result_key: RESULT_QUEUE.to_string(),
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Override the list keys.
    pub fn with_keys(mut self, task_key: impl Into<String>, result_key: impl Into<String>) -> Self {
        self.task_key = task_key.into();
        self.result_key = result_key.into();
        self
    }
}

/// Channels stored as Redis lists.
#[derive(Clone)]
pub struct RedisChannel {
    conn: ConnectionManager,
    task_key: String,
    result_key: String,
}

impl fmt::Debug for RedisChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisChannel")
            .field("connection", &"ConnectionManager")
            .field("task_key", &self.task_key)
            .field("result_key", &self.result_key)
            .finish()
    }
}

impl RedisChannel {
    pub async fn connect(config: RedisConfig) -> Result<Self, ChannelError> {
        info!("Connecting to Redis work queue at {}", config.url);

        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| ChannelError::InvalidConfig(format!("Invalid Redis URL: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| ChannelError::Unavailable(format!("Failed to connect to Redis: {e}")))?;

        info!(
            task_key = %config.task_key,
            result_key = %config.result_key,
            "Connected to Redis work queue"
        );

        Ok(Self {
            conn,
            task_key: config.task_key,
            result_key: config.result_key,
        })
    }

    /// Worker side: append a result record.
    pub async fn push_result(&self, result: &GenerationResult) -> Result<(), ChannelError> {
        let json = serde_json::to_string(result)?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(&self.result_key, json).await?;
        Ok(())
    }

    async fn snapshot<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<ChannelEntry<T>>, ChannelError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(key, 0, -1).await?;
        debug!("LRANGE {} -> {} entries", key, raw.len());
        Ok(parse_entries(key, raw))
    }
}

/// Decode an `LRANGE` reply in list order. Each entry keeps its exact
/// serialized value as the removal key for `LREM`; entries that do not decode
/// are skipped.
fn parse_entries<T: DeserializeOwned>(list: &str, raw: Vec<String>) -> Vec<ChannelEntry<T>> {
    raw.into_iter()
        .filter_map(|json| match serde_json::from_str(&json) {
            Ok(record) => Some(ChannelEntry { key: json, record }),
            Err(e) => {
                warn!("Skipping malformed entry in {}: {}", list, e);
                None
            }
        })
        .collect()
}

impl WorkChannel for RedisChannel {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn tasks(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationJob>>> {
        async move { self.snapshot(&self.task_key).await }.boxed()
    }

    fn push_task(&self, job: GenerationJob) -> ChannelFuture<'_, ()> {
        async move {
            let json = serde_json::to_string(&job)?;
            let mut conn = self.conn.clone();
            conn.rpush::<_, _, ()>(&self.task_key, json).await?;
            Ok(())
        }
        .boxed()
    }

    fn results(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationResult>>> {
        async move { self.snapshot(&self.result_key).await }.boxed()
    }

    fn remove_result<'a>(&'a self, key: &'a str) -> ChannelFuture<'a, bool> {
        async move {
            let mut conn = self.conn.clone();
            let removed: i64 = conn.lrem(&self.result_key, 1, key).await?;
            Ok(removed > 0)
        }
        .boxed()
    }
}
