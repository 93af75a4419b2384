use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::event::Event;

pub const HISTORY_CAPACITY: usize = 200;

/// Bounded, most-recent-first event store.
#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<Arc<Event>>,
    capacity: usize,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepends `event`, evicting from the tail past capacity.
    /// Returns whatever was evicted, oldest last.
    pub fn insert(&mut self, event: Event) -> Vec<Arc<Event>> {
        self.events.push_front(Arc::new(event));
        let mut evicted = Vec::new();
        while self.events.len() > self.capacity {
            if let Some(old) = self.events.pop_back() {
                evicted.push(old);
            }
        }
        evicted
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.events.iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only copy of the history at one point in time, most recent first.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<[Arc<Event>]>);

impl Deref for Snapshot {
    type Target = [Arc<Event>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// History shared between the reader task (sole writer) and any number of readers.
#[derive(Debug, Clone, Default)]
pub struct SharedHistory(Arc<RwLock<EventHistory>>);

impl SharedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().snapshot()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, EventHistory> {
        // a panicked writer cannot leave a half-applied insert behind
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, EventHistory> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
