//! One request, end to end, on a leased worker.
//!
//! plan -> submit -> poll (progress notices) -> resolve output. Every path
//! ends in exactly one final notice to the origin; releasing the worker and
//! the origin is left to the dispatcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use channel::{CorrelationClient, PollEvent};
use motion_core::{
    DispatchError, GenerationResult, JobId, JobStatus, Notice, OriginId, QueueEntry,
};

use crate::notifier::Outbox;
use crate::planner::RequestPlanner;

/// Everything a worker needs to run jobs. Shared by all workers.
pub struct JobContext {
    pub client: CorrelationClient,
    pub planner: Arc<dyn RequestPlanner>,
    pub outbox: Outbox,
    pub generation_timeout: Duration,
    pub output_dir: PathBuf,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { job_id: JobId, output_path: String },
    TimedOut { job_id: JobId },
    Failed(DispatchError),
}

impl JobOutcome {
    fn into_notice(self, timeout: Duration) -> Notice {
        match self {
            JobOutcome::Completed {
                job_id,
                output_path,
            } => Notice::Completed {
                job_id,
                output_path,
            },
            JobOutcome::TimedOut { job_id } => Notice::TimedOut {
                job_id,
                after_secs: timeout.as_secs(),
            },
            JobOutcome::Failed(error) => Notice::Failed { error },
        }
    }
}

/// Run `entry` to its outcome and deliver the final notice.
pub async fn run_job(ctx: &JobContext, entry: &QueueEntry) -> JobOutcome {
    let origin_id = &entry.origin_id;
    let outcome = execute(ctx, entry).await;

    match &outcome {
        JobOutcome::Completed { job_id, output_path } => {
            tracing::info!(job_id = %job_id, origin = %origin_id, output = %output_path, "Job completed");
        }
        JobOutcome::TimedOut { job_id } => {
            tracing::warn!(job_id = %job_id, origin = %origin_id, "Job timed out");
        }
        JobOutcome::Failed(error) => {
            tracing::warn!(origin = %origin_id, "Job failed: {}", error);
        }
    }

    ctx.outbox
        .send(origin_id, outcome.clone().into_notice(ctx.generation_timeout))
        .await;
    outcome
}

async fn execute(ctx: &JobContext, entry: &QueueEntry) -> JobOutcome {
    let input_refs = match ctx.planner.plan(&entry.payload).await {
        Ok(refs) => refs,
        Err(e) => return JobOutcome::Failed(DispatchError::PlanningFailed(e.to_string())),
    };

    let job_id = match ctx
        .client
        .submit(
            input_refs,
            ctx.output_dir.to_string_lossy(),
            &entry.origin_id,
        )
        .await
    {
        Ok(job_id) => job_id,
        Err(e) => return JobOutcome::Failed(DispatchError::QueueUnavailable(e.to_string())),
    };

    let mut poller = ctx.client.poll(job_id, ctx.generation_timeout);
    loop {
        match poller.next().await {
            PollEvent::Progress(status) => {
                report_progress(ctx, &entry.origin_id, job_id, status).await;
            }
            PollEvent::Finished(result) => return resolve(ctx, result).await,
            PollEvent::TimedOut => return JobOutcome::TimedOut { job_id },
            PollEvent::Cancelled => return JobOutcome::Failed(DispatchError::ShuttingDown),
        }
    }
}

async fn report_progress(ctx: &JobContext, origin_id: &OriginId, job_id: JobId, status: JobStatus) {
    tracing::debug!(job_id = %job_id, origin = %origin_id, status = %status, "Job progress");
    ctx.outbox
        .send(origin_id, Notice::Progress { job_id, status })
        .await;
}

async fn resolve(ctx: &JobContext, result: GenerationResult) -> JobOutcome {
    let job_id = result.job_id;
    if result.status == JobStatus::Failed {
        return JobOutcome::Failed(DispatchError::GenerationFailed {
            job_id,
            reason: result
                .error
                .unwrap_or_else(|| "no error detail reported".to_string()),
        });
    }

    let Some(reported) = result.output_path else {
        return JobOutcome::Failed(DispatchError::OutputMissing {
            job_id,
            path: String::new(),
        });
    };

    let path = output_location(&ctx.output_dir, &reported);
    match tokio::fs::try_exists(&path).await {
        Ok(true) => JobOutcome::Completed {
            job_id,
            output_path: path.to_string_lossy().into_owned(),
        },
        Ok(false) => JobOutcome::Failed(DispatchError::OutputMissing {
            job_id,
            path: path.to_string_lossy().into_owned(),
        }),
        Err(e) => {
            tracing::warn!(job_id = %job_id, "Cannot check output {}: {}", path.display(), e);
            JobOutcome::Failed(DispatchError::OutputMissing {
                job_id,
                path: path.to_string_lossy().into_owned(),
            })
        }
    }
}

/// Relative paths reported by the worker are relative to the output dir.
fn output_location(output_dir: &Path, reported: &str) -> PathBuf {
    let reported = Path::new(reported);
    if reported.is_absolute() {
        reported.to_path_buf()
    } else {
        output_dir.join(reported)
    }
}
