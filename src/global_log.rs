//! The store-wide log of every recorded event, indexed by commit position.
//!
//! Commit positions are gapless and start at 1, so the event at position `p`
//! lives at index `p - 1`. Catch-up subscriptions and `read_all` scan it
//! sequentially.

use std::sync::{Arc, RwLock};

use crate::sync::{read, write};
use crate::types::{CommitPosition, RecordedEvent};

#[derive(Debug, Default)]
pub struct GlobalLog {
    events: RwLock<Vec<Arc<RecordedEvent>>>,
}

impl GlobalLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed batch. Called by the group commit only.
    pub(crate) fn extend(&self, batch: &[Arc<RecordedEvent>]) {
        let mut events = write(&self.events);
        debug_assert!(batch
            .first()
            .map(|e| e.commit_position.as_raw() == events.len() as u64 + 1)
            .unwrap_or(true));
        events.extend(batch.iter().cloned());
    }

    /// Commit position of the last visible event.
    pub fn tail(&self) -> CommitPosition {
        CommitPosition::from_raw(read(&self.events).len() as u64)
    }

    /// Up to `limit` events with `commit_position > after`, in commit order.
    pub fn read_after(&self, after: CommitPosition, limit: usize) -> Vec<Arc<RecordedEvent>> {
        let events = read(&self.events);
        let start = (after.as_raw() as usize).min(events.len());
        let end = start.saturating_add(limit).min(events.len());
        events[start..end].to_vec()
    }
}
