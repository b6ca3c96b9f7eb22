//! Fixed-size pool of leaseable worker handles.

use std::collections::{HashMap, VecDeque};

/// A capacity unit in the pool. `T` is whatever runs the job, normally a
/// worker actor reference.
#[derive(Debug, Clone)]
pub struct WorkerHandle<T> {
    pub id: String,
    pub worker: T,
}

impl<T> WorkerHandle<T> {
    pub fn new(id: impl Into<String>, worker: T) -> Self {
        Self {
            id: id.into(),
            worker,
        }
    }
}

/// Pool of `size` handles, each either available or leased.
///
/// `available() + leased() == size()` holds after every operation.
/// Acquisition never waits: callers back off and retry.
#[derive(Debug)]
pub struct WorkerPool<T> {
    size: usize,
    available: VecDeque<WorkerHandle<T>>,
    leased: HashMap<String, WorkerHandle<T>>,
}

impl<T: Clone> WorkerPool<T> {
    pub fn new(handles: Vec<WorkerHandle<T>>) -> Self {
        Self {
            size: handles.len(),
            available: handles.into(),
            leased: HashMap::new(),
        }
    }

    /// Lease the longest-idle handle, if any.
    pub fn acquire(&mut self) -> Option<WorkerHandle<T>> {
        let handle = self.available.pop_front()?;
        self.leased.insert(handle.id.clone(), handle.clone());
        Some(handle)
    }

    /// Return a leased handle. Returns `false` if it was not leased, so a
    /// double release cannot grow the pool.
    pub fn release(&mut self, id: &str) -> bool {
        match self.leased.remove(id) {
            Some(handle) => {
                self.available.push_back(handle);
                true
            }
            None => false,
        }
    }

    /// Swap the handle `id` (leased or idle) for a fresh one, which becomes
    /// available. Returns `false` if `id` is unknown.
    pub fn replace(&mut self, id: &str, replacement: WorkerHandle<T>) -> bool {
        if self.leased.remove(id).is_none() {
            let before = self.available.len();
            self.available.retain(|h| h.id != id);
            if self.available.len() == before {
                return false;
            }
        }
        self.available.push_back(replacement);
        true
    }

    pub fn is_leased(&self, id: &str) -> bool {
        self.leased.contains_key(id)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }

    pub fn leased(&self) -> usize {
        self.leased.len()
    }

    /// Every handle, leased or not.
    pub fn handles(&self) -> impl Iterator<Item = &WorkerHandle<T>> {
        self.available.iter().chain(self.leased.values())
    }
}
