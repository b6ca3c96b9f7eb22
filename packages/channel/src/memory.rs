//! In-process channel backend.
//!
//! Used for local development and tests. Besides the [`WorkChannel`]
//! operations it exposes the worker side of both channels (taking tasks,
//! appending results) and a switch that makes every call fail as if the
//! backing queue were unreachable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use motion_core::{GenerationJob, GenerationResult};
use tokio::sync::Mutex;

use crate::{ChannelEntry, ChannelError, ChannelFuture, WorkChannel};

#[derive(Debug, Default)]
struct Lists {
    next_key: u64,
    tasks: VecDeque<(u64, GenerationJob)>,
    results: VecDeque<(u64, GenerationResult)>,
}

impl Lists {
    fn next_key(&mut self) -> u64 {
        self.next_key += 1;
        self.next_key
    }
}

/// Task and result channels held in memory.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    lists: Mutex<Lists>,
    offline: AtomicBool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `Unavailable` until reset.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), ChannelError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("memory channel is offline".into()));
        }
        Ok(())
    }

    /// Number of jobs waiting in the task channel.
    pub async fn task_count(&self) -> usize {
        self.lists.lock().await.tasks.len()
    }

    /// Number of records in the result channel.
    pub async fn result_count(&self) -> usize {
        self.lists.lock().await.results.len()
    }

    /// Worker side: pop the oldest job from the task channel.
    pub async fn take_task(&self) -> Option<GenerationJob> {
        self.lists.lock().await.tasks.pop_front().map(|(_, job)| job)
    }

    /// Worker side: append a result record.
    pub async fn push_result(&self, result: GenerationResult) {
        let mut lists = self.lists.lock().await;
        let key = lists.next_key();
        lists.results.push_back((key, result));
    }
}

impl WorkChannel for MemoryChannel {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn tasks(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationJob>>> {
        async move {
            self.check_online()?;
            let lists = self.lists.lock().await;
            Ok(lists
                .tasks
                .iter()
                .map(|(key, job)| ChannelEntry {
                    key: key.to_string(),
                    record: job.clone(),
                })
                .collect())
        }
        .boxed()
    }

    fn push_task(&self, job: GenerationJob) -> ChannelFuture<'_, ()> {
        async move {
            self.check_online()?;
            let mut lists = self.lists.lock().await;
            let key = lists.next_key();
            lists.tasks.push_back((key, job));
            Ok(())
        }
        .boxed()
    }

    fn results(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationResult>>> {
        async move {
            self.check_online()?;
            let lists = self.lists.lock().await;
            Ok(lists
                .results
                .iter()
                .map(|(key, result)| ChannelEntry {
                    key: key.to_string(),
                    record: result.clone(),
                })
                .collect())
        }
        .boxed()
    }

    fn remove_result<'a>(&'a self, key: &'a str) -> ChannelFuture<'a, bool> {
        async move {
            self.check_online()?;
            let mut lists = self.lists.lock().await;
            let before = lists.results.len();
            lists.results.retain(|(k, _)| k.to_string() != key);
            Ok(lists.results.len() < before)
        }
        .boxed()
    }
}
