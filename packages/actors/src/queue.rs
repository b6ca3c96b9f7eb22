//! FIFO holding area for admitted requests.

use std::collections::VecDeque;

use motion_core::{OriginId, QueueEntry};

/// Admitted requests awaiting a worker, oldest first.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<QueueEntry>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zero-based index of the origin's entry.
    pub fn index_of(&self, origin_id: &OriginId) -> Option<usize> {
        self.entries.iter().position(|e| &e.origin_id == origin_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Remove and return every entry, oldest first.
    pub fn drain(&mut self) -> Vec<QueueEntry> {
        self.entries.drain(..).collect()
    }
}
