//! # Global Sequencer
//!
//! The one store-wide counter of commit positions. The head only moves
//! forward, one position per event, and only once the events it covers are
//! durable:
//!
//! ```text
//!   group committer                          sequencer
//!   ───────────────                          ─────────
//!   first = next_position()  ──────────────► read head
//!   number events from `first`
//!   journal.persist(group)      (sequencer not held)
//!   advance(n)               ──────────────► head += n
//!   publish
//! ```
//!
//! The critical section is the counter itself and never spans I/O. Only the
//! group committer advances the head, and it does so while it owns the
//! journal, so nothing moves the head between `next_position` and `advance`.
//! A persist that fails never reaches `advance` and consumes nothing.

use std::sync::Mutex;

use crate::sync::lock;
use crate::types::CommitPosition;

/// Owns the last assigned commit position.
#[derive(Debug)]
pub struct GlobalSequencer {
    /// Last assigned commit position (`START` when nothing was committed).
    head: Mutex<CommitPosition>,
}

impl GlobalSequencer {
    /// Creates a sequencer whose last assigned position is `head`.
    pub fn new(head: CommitPosition) -> Self {
        Self {
            head: Mutex::new(head),
        }
    }

    /// The last commit position handed out.
    pub fn head(&self) -> CommitPosition {
        *lock(&self.head)
    }

    /// The position the next committed event will receive.
    pub fn next_position(&self) -> CommitPosition {
        lock(&self.head).next()
    }

    /// Hands out `count` consecutive positions and returns the first.
    pub(crate) fn advance(&self, count: u64) -> CommitPosition {
        debug_assert!(count > 0, "empty batches are rejected before sequencing");
        let mut head = lock(&self.head);
        let first = head.next();
        *head = first.add(count - 1);
        first
    }
}
