//! Actor system for the generation dispatcher.
//!
//! This crate provides the Ractor-based dispatcher that admits requests,
//! queues them, leases a bounded set of workers and reports back to callers.
//!
//! # Architecture
//!
//! - `DispatcherActor` - Owns admission, the request queue, the worker pool
//!   and the status broadcaster
//! - `WorkerActor` - Runs one job flow at a time (plan, submit, poll)
//!
//! # Usage
//!
//! ```ignore
//! use actors::{DispatcherDeps, start_dispatcher};
//!
//! let (dispatcher, handle) = start_dispatcher(config, deps).await?;
//! let position = dispatcher.admit(origin_id, request).await?;
//! ```

mod admission;
mod broadcaster;
mod dispatcher;
mod handle;
mod job_flow;
mod messages;
mod notifier;
mod planner;
mod pool;
mod queue;
mod worker_actor;

pub use admission::AdmissionController;
pub use broadcaster::StatusBroadcaster;
pub use dispatcher::DispatcherActor;
pub use handle::{DispatcherDeps, DispatcherHandle, start_dispatcher};
pub use job_flow::{JobContext, JobOutcome, run_job};
pub use messages::{DispatcherMessage, DispatcherSnapshot, WorkerMessage};
pub use notifier::{LogNotifier, NoticeRef, Notifier, NotifyError, NotifyFuture, Outbox};
pub use planner::{
    DANCE_COLLECTION, FnPlanner, IMAGE_COLLECTION, MediaLookup, MediaPlanner, PlanError,
    PlanFuture, PlanResult, RequestPlanner, RequirementExtractor, parse_requirements,
};
pub use pool::{WorkerHandle, WorkerPool};
pub use queue::RequestQueue;
pub use worker_actor::WorkerActor;

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
