//! Work and result channels shared with the external generation worker.
//!
//! The generation worker drains an ordered task channel and appends status
//! records to an ordered result channel. This crate provides:
//!
//! - [`WorkChannel`], the seam over both channels, with Redis, SurrealDB and
//!   in-memory backends
//! - [`CorrelationClient`], which submits jobs with input deduplication and
//!   waits for the result carrying the same job id
//! - [`ResultPoller`], the per-job polling state machine behind the client
//!
//! # Features
//!
//! - `rocksdb`: RocksDB storage for `file://` SurrealDB endpoints. Without it
//!   only `mem://` and remote endpoints connect.

mod client;
mod config;
mod error;
mod memory;
mod poller;
mod redis_list;
mod surreal;

pub use client::CorrelationClient;
pub use config::{ChannelConfig, RESULT_QUEUE, TASK_QUEUE, connect};
pub use error::ChannelError;
pub use memory::MemoryChannel;
pub use poller::{PollEvent, PollState, ResultPoller};
pub use redis_list::{RedisChannel, RedisConfig};
pub use surreal::{SurrealChannel, SurrealConfig};

use futures_util::future::BoxFuture;
use motion_core::{GenerationJob, GenerationResult};

/// Future type returned by channel operations.
pub type ChannelFuture<'a, T> = BoxFuture<'a, Result<T, ChannelError>>;

/// A record read from a channel, paired with the backend key that
/// identifies this exact entry for removal.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEntry<T> {
    pub key: String,
    pub record: T,
}

/// Access to the task and result channels.
///
/// Reads return a snapshot in channel order. Scans are linear; channel depth
/// stays bounded because the dispatcher never has more than its worker count
/// of jobs outstanding.
pub trait WorkChannel: Send + Sync + 'static {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Snapshot of the task channel, oldest first.
    fn tasks(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationJob>>>;

    /// Append a job to the tail of the task channel.
    fn push_task(&self, job: GenerationJob) -> ChannelFuture<'_, ()>;

    /// Snapshot of the result channel, oldest first.
    fn results(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationResult>>>;

    /// Remove one result entry by key.
    ///
    /// Returns `false` when the entry was already gone.
    fn remove_result<'a>(&'a self, key: &'a str) -> ChannelFuture<'a, bool>;
}
