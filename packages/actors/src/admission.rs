//! One outstanding request per origin.

use std::collections::HashSet;

use motion_core::{DispatchError, GenerationRequest, OriginId, QueueEntry};

use crate::queue::RequestQueue;

/// Owns the pending set and the request queue together, so the duplicate
/// check and the enqueue are a single step.
///
/// An origin is pending from admission until [`release`](Self::release),
/// whether its entry is still queued or has been handed to a worker.
#[derive(Debug, Default)]
pub struct AdmissionController {
    pending: HashSet<OriginId>,
    queue: RequestQueue,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a request unless the origin already has one outstanding.
    ///
    /// Returns the zero-based position: queued entries ahead plus `busy`
    /// workers.
    pub fn try_admit(
        &mut self,
        origin_id: OriginId,
        payload: GenerationRequest,
        busy: usize,
    ) -> Result<usize, DispatchError> {
        if self.pending.contains(&origin_id) {
            return Err(DispatchError::DuplicateRequest(origin_id));
        }

        let position = self.queue.len() + busy;
        self.pending.insert(origin_id.clone());
        self.queue.push(QueueEntry::new(origin_id, payload));
        Ok(position)
    }

    /// Take the head entry for a worker. Its origin stays pending.
    pub fn next_entry(&mut self) -> Option<QueueEntry> {
        self.queue.pop()
    }

    /// Clear the origin once its request reached a terminal outcome.
    pub fn release(&mut self, origin_id: &OriginId) -> bool {
        self.pending.remove(origin_id)
    }

    /// Drop every queued entry and release their origins.
    pub fn drain_queue(&mut self) -> Vec<QueueEntry> {
        let drained = self.queue.drain();
        for entry in &drained {
            self.pending.remove(&entry.origin_id);
        }
        drained
    }

    pub fn is_pending(&self, origin_id: &OriginId) -> bool {
        self.pending.contains(origin_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn has_waiting(&self) -> bool {
        !self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(id: &str) -> OriginId {
        OriginId::from(id)
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("make me dance")
    }

    #[test]
    fn positions_count_queue_and_busy_workers() {
        let mut admission = AdmissionController::new();
        assert_eq!(admission.try_admit(origin("u1"), request(), 0), Ok(0));
        assert_eq!(admission.try_admit(origin("u2"), request(), 0), Ok(1));
        assert_eq!(admission.try_admit(origin("u3"), request(), 2), Ok(4));
    }

    #[test]
    fn duplicate_rejected_while_queued_or_leased() {
        let mut admission = AdmissionController::new();
        admission.try_admit(origin("u1"), request(), 0).unwrap();
        assert_eq!(
            admission.try_admit(origin("u1"), request(), 0),
            Err(DispatchError::DuplicateRequest(origin("u1")))
        );

        let leased = admission.next_entry().unwrap();
        assert_eq!(leased.origin_id, origin("u1"));
        assert!(admission.is_pending(&origin("u1")));
        assert!(admission.try_admit(origin("u1"), request(), 1).is_err());
        assert_eq!(admission.queue().len(), 0);
    }

    #[test]
    fn release_allows_readmission() {
        let mut admission = AdmissionController::new();
        admission.try_admit(origin("u1"), request(), 0).unwrap();
        admission.next_entry();
        assert!(admission.release(&origin("u1")));
        assert!(!admission.release(&origin("u1")));
        assert_eq!(admission.try_admit(origin("u1"), request(), 0), Ok(0));
    }

    #[test]
    fn drain_releases_only_queued_origins() {
        let mut admission = AdmissionController::new();
        admission.try_admit(origin("u1"), request(), 0).unwrap();
        admission.try_admit(origin("u2"), request(), 0).unwrap();
        admission.next_entry();

        let drained = admission.drain_queue();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].origin_id, origin("u2"));
        assert!(admission.is_pending(&origin("u1")));
        assert!(!admission.is_pending(&origin("u2")));
        assert_eq!(admission.pending_count(), 1);
    }
}
