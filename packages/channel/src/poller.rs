//! Per-job result polling.
//!
//! A [`ResultPoller`] moves through `Submitted -> Polling -> Terminal`. Each
//! call to [`ResultPoller::next`] scans the result channel (sleeping one poll
//! interval between scans) until it has something to report: a new
//! non-terminal status, the terminal result, the timeout, or cancellation.
//! All waiting goes through `tokio::time`, so tests drive it with a paused
//! clock.

use std::sync::Arc;
use std::time::Duration;

use motion_core::{GenerationResult, JobId, JobStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{ChannelEntry, ChannelError, WorkChannel};

/// Something worth reporting about the polled job.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// The job moved to a non-terminal status not reported before.
    Progress(JobStatus),
    /// A terminal result was found and consumed from the channel.
    Finished(GenerationResult),
    /// The timeout elapsed without a terminal result.
    TimedOut,
    /// The cancellation token fired.
    Cancelled,
}

impl PollEvent {
    fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Progress(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// No scan yet; the first scan happens without waiting.
    Submitted,
    /// Scanning every poll interval.
    Polling { last_status: Option<JobStatus> },
    /// Done; further calls repeat the final event.
    Terminal(PollEvent),
}

/// Polls the result channel for one job id.
pub struct ResultPoller {
    channel: Arc<dyn WorkChannel>,
    job_id: JobId,
    interval: Duration,
    timeout: Option<Duration>,
    started: Instant,
    cancel: CancellationToken,
    state: PollState,
}

impl ResultPoller {
    /// Create a poller. A zero `timeout` polls until a terminal result or
    /// cancellation.
    pub fn new(
        channel: Arc<dyn WorkChannel>,
        job_id: JobId,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            job_id,
            interval,
            timeout: (!timeout.is_zero()).then_some(timeout),
            started: Instant::now(),
            cancel: CancellationToken::new(),
            state: PollState::Submitted,
        }
    }

    /// Stop polling when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Advance until there is an event to report.
    pub async fn next(&mut self) -> PollEvent {
        loop {
            let last_status = match self.state.clone() {
                PollState::Terminal(event) => return event,
                PollState::Submitted => {
                    self.state = PollState::Polling { last_status: None };
                    None
                }
                PollState::Polling { last_status } => {
                    if self.is_expired() {
                        return self.finish(PollEvent::TimedOut);
                    }
                    let wait = self.next_wait();
                    tokio::select! {
                        _ = self.cancel.cancelled() => return self.finish(PollEvent::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                    last_status
                }
            };

            if self.cancel.is_cancelled() {
                return self.finish(PollEvent::Cancelled);
            }

            match self.scan().await {
                Ok(Some(entry)) if entry.record.is_terminal() => {
                    self.consume(&entry).await;
                    return self.finish(PollEvent::Finished(entry.record));
                }
                Ok(Some(entry)) if Some(entry.record.status) != last_status => {
                    let status = entry.record.status;
                    self.state = PollState::Polling {
                        last_status: Some(status),
                    };
                    return PollEvent::Progress(status);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        backend = self.channel.backend(),
                        "Result channel unreachable, retrying: {}",
                        e
                    );
                }
            }
        }
    }

    /// Drive the poller to its final event, ignoring progress.
    pub async fn finish_event(&mut self) -> PollEvent {
        loop {
            let event = self.next().await;
            if event.is_terminal() {
                return event;
            }
        }
    }

    fn finish(&mut self, event: PollEvent) -> PollEvent {
        self.state = PollState::Terminal(event.clone());
        event
    }

    fn is_expired(&self) -> bool {
        self.timeout
            .is_some_and(|timeout| self.started.elapsed() >= timeout)
    }

    fn next_wait(&self) -> Duration {
        match self.timeout {
            Some(timeout) => self
                .interval
                .min(timeout.saturating_sub(self.started.elapsed())),
            None => self.interval,
        }
    }

    /// Find this job's entry in a snapshot of the result channel.
    ///
    /// A terminal entry wins over progress entries; among progress entries
    /// the most recent one is reported.
    async fn scan(&self) -> Result<Option<ChannelEntry<GenerationResult>>, ChannelError> {
        let results = self.channel.results().await?;
        tracing::debug!(job_id = %self.job_id, entries = results.len(), "Scanned result channel");

        let mut latest = None;
        for entry in results {
            if entry.record.job_id != self.job_id {
                continue;
            }
            if entry.record.is_terminal() {
                return Ok(Some(entry));
            }
            latest = Some(entry);
        }
        Ok(latest)
    }

    async fn consume(&self, entry: &ChannelEntry<GenerationResult>) {
        match self.channel.remove_result(&entry.key).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(job_id = %self.job_id, "Result already consumed by another poller");
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, "Failed to remove consumed result: {}", e);
            }
        }
    }
}
