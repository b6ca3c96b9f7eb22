//! Caller-facing notices and the dispatcher event stream.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{DispatchError, JobId, JobStatus, OriginId};

/// A notification delivered to the caller that owns a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The request was accepted; `position` counts requests and busy
    /// workers ahead of it.
    Admitted { position: usize },
    /// The caller already has a request in flight.
    Rejected,
    /// Periodic queue position update for a waiting request.
    QueueStatus { position: usize, eta: Duration },
    /// A worker picked up the request.
    Started { worker_id: String },
    /// The generation worker reported a new non-terminal status.
    Progress { job_id: JobId, status: JobStatus },
    /// Generation finished and the output file exists.
    Completed { job_id: JobId, output_path: String },
    /// No terminal result arrived within the generation timeout.
    TimedOut { job_id: JobId, after_secs: u64 },
    /// The request ended without output.
    Failed { error: DispatchError },
}

impl Notice {
    /// Whether this notice ends the caller's request.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Notice::Completed { .. } | Notice::TimedOut { .. } | Notice::Failed { .. }
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Notice::Admitted { .. } => "admitted",
            Notice::Rejected => "rejected",
            Notice::QueueStatus { .. } => "queue_status",
            Notice::Started { .. } => "started",
            Notice::Progress { .. } => "progress",
            Notice::Completed { .. } => "completed",
            Notice::TimedOut { .. } => "timed_out",
            Notice::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Admitted { position: 0 } => {
                write!(f, "Processing your request... This may take a few minutes.")
            }
            Notice::Admitted { position } => write!(
                f,
                "Processing your request... You are #{} in line, this may take a while.",
                position
            ),
            Notice::Rejected => write!(
                f,
                "You already have a video in progress. Please wait until it is done."
            ),
            Notice::QueueStatus { position, eta } => write!(
                f,
                "You are #{} in the queue. Estimated wait: about {} min.",
                position,
                eta.as_secs().div_ceil(60)
            ),
            Notice::Started { .. } => write!(f, "Your video is being generated now."),
            Notice::Progress { status, .. } => write!(f, "Generation status: {}", status),
            Notice::Completed { output_path, .. } => {
                write!(f, "Your video is ready: {}", output_path)
            }
            Notice::TimedOut { after_secs, .. } => write!(
                f,
                "Sorry, your video was not ready after {} seconds. Please try again later.",
                after_secs
            ),
            Notice::Failed {
                error: DispatchError::OutputMissing { .. },
            } => write!(f, "Sorry, there was an error generating your video."),
            Notice::Failed { error } => write!(f, "An error occurred: {}", error),
        }
    }
}

/// Every notice the dispatcher produces, published for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    pub origin_id: OriginId,
    pub notice: Notice,
    pub timestamp: DateTime<Utc>,
}

impl DispatchEvent {
    pub fn new(origin_id: OriginId, notice: Notice) -> Self {
        Self {
            origin_id,
            notice,
            timestamp: Utc::now(),
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match &self.notice {
            Notice::Admitted { position } => {
                format!("{} admitted at position {}", self.origin_id, position)
            }
            Notice::Rejected => format!("{} rejected: request already pending", self.origin_id),
            Notice::QueueStatus { position, .. } => {
                format!("{} waiting at #{}", self.origin_id, position)
            }
            Notice::Started { worker_id } => {
                format!("{} leased {}", self.origin_id, worker_id)
            }
            Notice::Progress { job_id, status } => {
                format!("Job {} for {} -> {}", job_id, self.origin_id, status)
            }
            Notice::Completed {
                job_id,
                output_path,
            } => format!("Job {} for {} completed: {}", job_id, self.origin_id, output_path),
            Notice::TimedOut { job_id, after_secs } => format!(
                "Job {} for {} timed out after {}s",
                job_id, self.origin_id, after_secs
            ),
            Notice::Failed { error } => format!("{} failed: {}", self.origin_id, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_status_rounds_eta_up_to_minutes() {
        let notice = Notice::QueueStatus {
            position: 2,
            eta: Duration::from_secs(61),
        };
        assert_eq!(
            notice.to_string(),
            "You are #2 in the queue. Estimated wait: about 2 min."
        );
    }

    #[test]
    fn final_notices() {
        let job_id = JobId::new();
        assert!(Notice::TimedOut {
            job_id,
            after_secs: 300
        }
        .is_final());
        assert!(!Notice::Progress {
            job_id,
            status: JobStatus::Processing
        }
        .is_final());
        assert!(!Notice::Admitted { position: 0 }.is_final());
    }
}
