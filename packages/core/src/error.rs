//! Error taxonomy for admission and per-job processing.

use thiserror::Error;

use crate::{JobId, OriginId};

/// Errors surfaced to callers by the dispatcher.
///
/// Per-job variants are turned into a caller notice by the job flow; only
/// `Misconfigured` is fatal, and only at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("origin {0} already has a request in progress")]
    DuplicateRequest(OriginId),

    #[error("work queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("job {0} produced no result within {1}s")]
    GenerationTimeout(JobId, u64),

    #[error("job {job_id} failed: {reason}")]
    GenerationFailed { job_id: JobId, reason: String },

    #[error("job {job_id} completed but output {path} is missing")]
    OutputMissing { job_id: JobId, path: String },

    #[error("could not plan request: {0}")]
    PlanningFailed(String),

    #[error("dispatcher is shutting down")]
    ShuttingDown,

    #[error("worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("invalid configuration: {0}")]
    Misconfigured(String),

    #[error("dispatcher unavailable: {0}")]
    Unavailable(String),
}
