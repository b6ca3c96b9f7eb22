//! Periodic queue position and wait estimates.

use std::collections::HashMap;
use std::time::Duration;

use motion_core::{Notice, OriginId};

use crate::notifier::NoticeRef;
use crate::queue::RequestQueue;

/// Computes status notices for waiting requests and remembers the last
/// status message sent to each origin so the next one can edit it.
#[derive(Debug)]
pub struct StatusBroadcaster {
    period: Duration,
    per_job_estimate: Duration,
    workers: usize,
    delivered: HashMap<OriginId, NoticeRef>,
    started: bool,
}

impl StatusBroadcaster {
    pub fn new(period: Duration, per_job_estimate: Duration, workers: usize) -> Self {
        Self {
            period,
            per_job_estimate,
            workers: workers.max(1),
            delivered: HashMap::new(),
            started: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Estimated wait for a one-based queue position.
    pub fn eta(&self, position: usize) -> Duration {
        self.per_job_estimate
            .mul_f64(position as f64 / self.workers as f64)
    }

    /// Status notice for every queued entry, in queue order.
    pub fn statuses(&self, queue: &RequestQueue) -> Vec<(OriginId, Notice)> {
        queue
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let position = index + 1;
                (
                    entry.origin_id.clone(),
                    Notice::QueueStatus {
                        position,
                        eta: self.eta(position),
                    },
                )
            })
            .collect()
    }

    /// Returns `true` exactly once per start, when the periodic tick is not
    /// running yet.
    pub fn should_start(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }

    /// Mark the tick as stopped; the next waiting request starts it again.
    pub fn stopped(&mut self) {
        self.started = false;
    }

    pub fn is_running(&self) -> bool {
        self.started
    }

    pub fn previous(&self, origin_id: &OriginId) -> Option<&NoticeRef> {
        self.delivered.get(origin_id)
    }

    pub fn record(&mut self, origin_id: OriginId, reference: NoticeRef) {
        self.delivered.insert(origin_id, reference);
    }

    /// The origin left the queue; later status messages start fresh.
    pub fn forget(&mut self, origin_id: &OriginId) {
        self.delivered.remove(origin_id);
    }

    /// Number of origins with a status message on record.
    pub fn tracked(&self) -> usize {
        self.delivered.len()
    }
}
