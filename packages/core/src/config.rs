//! Dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DispatchError;

/// Configuration for the dispatcher and its worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of workers (maximum concurrent generation jobs).
    pub workers: usize,
    /// Hard limit on waiting for a terminal result (milliseconds, 0 = unbounded).
    pub generation_timeout_ms: u64,
    /// Delay between result channel scans (milliseconds).
    pub poll_interval_ms: u64,
    /// Delay before retrying dispatch when no worker is free (milliseconds).
    pub dispatch_backoff_ms: u64,
    /// Period of queue position updates (milliseconds).
    pub status_interval_ms: u64,
    /// Expected duration of a single generation job (milliseconds), used for ETAs.
    pub per_job_estimate_ms: u64,
    /// Directory the generation worker writes outputs into.
    pub output_dir: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            generation_timeout_ms: 300_000,
            poll_interval_ms: 1000,
            dispatch_backoff_ms: 1000,
            status_interval_ms: 30_000,
            per_job_estimate_ms: 300_000,
            output_dir: "generated_videos".to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Set the worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the generation timeout.
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout_ms = as_millis(timeout);
        self
    }

    /// Set the result poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = as_millis(interval);
        self
    }

    /// Set the dispatch backoff.
    pub fn with_dispatch_backoff(mut self, backoff: Duration) -> Self {
        self.dispatch_backoff_ms = as_millis(backoff);
        self
    }

    /// Set the status update period.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval_ms = as_millis(interval);
        self
    }

    /// Set the per-job estimate used for ETAs.
    pub fn with_per_job_estimate(mut self, estimate: Duration) -> Self {
        self.per_job_estimate_ms = as_millis(estimate);
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Reject configurations the dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.workers == 0 {
            return Err(DispatchError::Misconfigured(
                "worker pool size must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(DispatchError::Misconfigured(
                "poll interval must be non-zero".into(),
            ));
        }
        if self.dispatch_backoff_ms == 0 {
            return Err(DispatchError::Misconfigured(
                "dispatch backoff must be non-zero".into(),
            ));
        }
        if self.status_interval_ms == 0 {
            return Err(DispatchError::Misconfigured(
                "status interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn dispatch_backoff(&self) -> Duration {
        Duration::from_millis(self.dispatch_backoff_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn per_job_estimate(&self) -> Duration {
        Duration::from_millis(self.per_job_estimate_ms)
    }
}

/// Whole milliseconds, saturating; sub-millisecond durations round up so a
/// non-zero duration never becomes zero.
fn as_millis(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 && !duration.is_zero() {
        1
    } else {
        millis
    }
}
