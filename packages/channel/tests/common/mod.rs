#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use channel::{CorrelationClient, MemoryChannel, WorkChannel};
use motion_core::{GenerationResult, OriginId};

pub const POLL: Duration = Duration::from_secs(1);

/// A memory channel plus a client polling it every [`POLL`].
pub fn memory_client() -> (Arc<MemoryChannel>, CorrelationClient) {
    let memory = Arc::new(MemoryChannel::new());
    let channel: Arc<dyn WorkChannel> = memory.clone();
    let client = CorrelationClient::new(channel).with_poll_interval(POLL);
    (memory, client)
}

pub fn origin(name: &str) -> OriginId {
    OriginId::new(name)
}

pub fn refs(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

/// Append `result` after `delay`, as the generation worker would.
pub fn push_result_after(memory: &Arc<MemoryChannel>, delay: Duration, result: GenerationResult) {
    let memory = memory.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        memory.push_result(result).await;
    });
}
