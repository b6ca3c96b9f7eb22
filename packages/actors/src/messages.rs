//! Message types for actor communication.

use motion_core::{DispatchError, GenerationRequest, OriginId, QueueEntry};
use ractor::RpcReplyPort;

/// Messages for the DispatcherActor.
#[derive(Debug)]
pub enum DispatcherMessage {
    /// Admit a request; replies with its position.
    Admit {
        origin_id: OriginId,
        payload: GenerationRequest,
        reply: RpcReplyPort<Result<usize, DispatchError>>,
    },

    /// Match queued requests to free workers.
    Dispatch,

    /// A worker finished its flow, whatever the outcome.
    JobFinished {
        worker_id: String,
        origin_id: OriginId,
    },

    /// Periodic queue position update.
    BroadcastStatus,

    /// Get a view of queue and pool.
    Snapshot {
        reply: RpcReplyPort<DispatcherSnapshot>,
    },

    /// Stop accepting work and shut down once workers are done.
    Shutdown,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run a leased request to completion.
    Process { entry: Box<QueueEntry> },

    /// Shutdown the worker.
    Shutdown,
}

/// Point-in-time view of the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherSnapshot {
    /// Waiting origins, head first.
    pub queued: Vec<OriginId>,
    /// Origins currently on a worker, sorted.
    pub leased: Vec<OriginId>,
    pub available_workers: usize,
    pub leased_workers: usize,
}

impl DispatcherSnapshot {
    /// Whether `origin_id` has outstanding work.
    pub fn is_pending(&self, origin_id: &OriginId) -> bool {
        self.queued.contains(origin_id) || self.leased.contains(origin_id)
    }
}
