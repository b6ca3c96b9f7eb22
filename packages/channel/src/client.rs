//! Job submission and result correlation.

use std::sync::Arc;
use std::time::Duration;

use motion_core::{GenerationJob, GenerationResult, JobId, OriginId};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{ChannelError, PollEvent, ResultPoller, WorkChannel};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Client for the task and result channels.
///
/// Submission deduplicates on `input_refs` against the jobs still waiting in
/// the task channel. Scan and push happen under one lock, so concurrent
/// submissions from this process cannot both miss each other.
pub struct CorrelationClient {
    channel: Arc<dyn WorkChannel>,
    submit_lock: Mutex<()>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl CorrelationClient {
    pub fn new(channel: Arc<dyn WorkChannel>) -> Self {
        Self {
            channel,
            submit_lock: Mutex::new(()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the delay between result scans.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Stop every wait started by this client when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn channel(&self) -> &Arc<dyn WorkChannel> {
        &self.channel
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Submit a job, or return the id of a queued job with the same inputs.
    ///
    /// Fails when the task channel cannot be read or written.
    pub async fn submit(
        &self,
        input_refs: Vec<String>,
        output_dir: impl Into<String>,
        origin_id: &OriginId,
    ) -> Result<JobId, ChannelError> {
        let _guard = self.submit_lock.lock().await;

        let pending = self.channel.tasks().await?;
        if let Some(existing) = pending
            .iter()
            .find(|entry| entry.record.same_inputs(&input_refs))
        {
            info!(
                job_id = %existing.record.job_id,
                origin = %origin_id,
                "Identical job already queued, reusing its id"
            );
            return Ok(existing.record.job_id);
        }

        let job = GenerationJob::new(input_refs, output_dir, origin_id.clone());
        let job_id = job.job_id;
        self.channel.push_task(job).await?;

        info!(
            job_id = %job_id,
            origin = %origin_id,
            backend = self.channel.backend(),
            "Submitted generation job"
        );
        Ok(job_id)
    }

    /// Start polling for `job_id`. A zero `timeout` waits indefinitely.
    pub fn poll(&self, job_id: JobId, timeout: Duration) -> ResultPoller {
        ResultPoller::new(self.channel.clone(), job_id, timeout, self.poll_interval)
            .with_cancellation(self.cancel.child_token())
    }

    /// Wait for the terminal result of `job_id`.
    ///
    /// Returns `None` when the timeout elapses or the client is cancelled.
    /// Channel errors while waiting are logged and retried.
    pub async fn await_result(&self, job_id: JobId, timeout: Duration) -> Option<GenerationResult> {
        let mut poller = self.poll(job_id, timeout);
        loop {
            match poller.next().await {
                PollEvent::Progress(status) => {
                    info!(job_id = %job_id, status = %status, "Job status changed");
                }
                PollEvent::Finished(result) => {
                    debug!(job_id = %job_id, status = %result.status, "Job finished");
                    return Some(result);
                }
                PollEvent::TimedOut => {
                    warn!(
                        job_id = %job_id,
                        elapsed_ms = poller.elapsed().as_millis() as u64,
                        "Timed out waiting for job result"
                    );
                    return None;
                }
                PollEvent::Cancelled => {
                    debug!(job_id = %job_id, "Stopped waiting for job result");
                    return None;
                }
            }
        }
    }
}
