//! # Stream Log
//!
//! One [`StreamLog`] per stream name. It serializes every append to its
//! stream and enforces optimistic concurrency:
//!
//! ```text
//! append(expected, batch)
//!     │
//!     ├─ writer lock (one in-flight append per stream)
//!     ├─ expected.matches(current)?  ── no ──► ConcurrencyConflict
//!     ├─ stream positions current+1 ..= current+n
//!     └─ group commit ──► durable ──► events visible (whole batch at once)
//! ```
//!
//! The writer lock stays held until the batch is published, so the next
//! append to this stream checks against a version that includes it.
//!
//! Readers never take the writer lock. They see the `events` vector, which
//! only grows by complete, fully positioned batches.

use std::sync::{Arc, Mutex, RwLock};

use crate::committer::GroupCommitter;
use crate::error::{Error, Result};
use crate::sync::{lock, read, write};
use crate::types::{
    current_time_ms, CommitPosition, CurrentVersion, Direction, ExpectedVersion, NewEvent,
    ReadOptions, RecordedEvent, StreamName, StreamPosition,
};

// =============================================================================
// Append Result
// =============================================================================

/// Positions assigned by a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    pub first_position: StreamPosition,
    pub last_position: StreamPosition,
    pub first_commit: CommitPosition,
    pub last_commit: CommitPosition,
}

impl AppendResult {
    pub fn event_count(&self) -> u64 {
        self.last_commit.as_raw() - self.first_commit.as_raw() + 1
    }
}

// =============================================================================
// Stream Log
// =============================================================================

#[derive(Debug)]
pub struct StreamLog {
    name: StreamName,

    /// Held for the whole check-and-commit of an append.
    writer: Mutex<()>,

    /// Index `i` holds the event at stream position `i`.
    events: RwLock<Vec<Arc<RecordedEvent>>>,
}

impl StreamLog {
    pub fn new(name: StreamName) -> Self {
        Self {
            name,
            writer: Mutex::new(()),
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &StreamName {
        &self.name
    }

    pub fn current_version(&self) -> CurrentVersion {
        match read(&self.events).len() {
            0 => CurrentVersion::NoStream,
            n => CurrentVersion::At(StreamPosition::from_raw(n as u64 - 1)),
        }
    }

    /// Number of visible events.
    pub fn len(&self) -> usize {
        read(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, position: StreamPosition) -> Option<Arc<RecordedEvent>> {
        read(&self.events).get(position.as_raw() as usize).cloned()
    }

    /// Appends `events` if the stream is at `expected`.
    ///
    /// Returns once the batch is durable and visible in this stream, the
    /// global log and every live subscription.
    pub(crate) fn append(
        self: &Arc<Self>,
        expected: ExpectedVersion,
        events: Vec<NewEvent>,
        committer: &GroupCommitter,
    ) -> Result<AppendResult> {
        if events.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "append to '{}' carries no events",
                self.name
            )));
        }

        let _writer = lock(&self.writer);

        let current = self.current_version();
        if !expected.matches(current) {
            return Err(Error::ConcurrencyConflict {
                stream: self.name.clone(),
                expected,
                actual: current,
            });
        }

        let first_position = current.next_position();
        let count = events.len() as u64;
        let recorded_at_ms = current_time_ms();

        // Commit positions are assigned by the group commit.
        let staged: Vec<RecordedEvent> = events
            .into_iter()
            .enumerate()
            .map(|(i, event)| RecordedEvent {
                id: event.id,
                event_type: event.event_type,
                data: event.data,
                metadata: event.metadata,
                stream_name: self.name.clone(),
                stream_position: first_position.add(i as u64),
                commit_position: CommitPosition::START,
                recorded_at_ms,
            })
            .collect();

        let batch = committer.submit(Arc::clone(self), staged)?;
        Ok(AppendResult {
            first_position,
            last_position: first_position.add(count - 1),
            first_commit: batch[0].commit_position,
            last_commit: batch[batch.len() - 1].commit_position,
        })
    }

    /// Makes a committed batch visible. Called by the group commit only.
    pub(crate) fn extend(&self, batch: &[Arc<RecordedEvent>]) {
        write(&self.events).extend(batch.iter().cloned());
    }

    /// Re-inserts a recovered event. The caller guarantees gapless order.
    pub(crate) fn restore(&self, event: Arc<RecordedEvent>) {
        write(&self.events).push(event);
    }

    /// Starts a lazy read over the events visible right now.
    pub fn read(self: &Arc<Self>, options: ReadOptions) -> StreamReader {
        StreamReader::new(Arc::clone(self), options)
    }
}

// =============================================================================
// Stream Reader
// =============================================================================

/// A finite, lazy, restartable read of one stream.
///
/// The reader is bounded by the events that were visible when it was created:
/// appends that commit while it is being consumed are not included, so
/// iteration always terminates. [`StreamReader::restart`] rewinds to the
/// original starting point within the same bound.
#[derive(Debug, Clone)]
pub struct StreamReader {
    log: Arc<StreamLog>,
    options: ReadOptions,
    /// Number of events visible when the read began.
    bound: u64,
    next: Option<u64>,
    yielded: usize,
}

impl StreamReader {
    fn new(log: Arc<StreamLog>, options: ReadOptions) -> Self {
        let bound = log.len() as u64;
        let next = Self::start(&options, bound);
        Self {
            log,
            options,
            bound,
            next,
            yielded: 0,
        }
    }

    fn start(options: &ReadOptions, bound: u64) -> Option<u64> {
        if bound == 0 {
            return None;
        }
        match options.direction {
            Direction::Forwards => {
                let from = options.from.map(|p| p.as_raw()).unwrap_or(0);
                (from < bound).then_some(from)
            }
            Direction::Backwards => {
                let last = bound - 1;
                Some(options.from.map(|p| p.as_raw().min(last)).unwrap_or(last))
            }
        }
    }

    pub fn stream_name(&self) -> &StreamName {
        self.log.name()
    }

    /// Rewinds to the first event of this read.
    pub fn restart(&mut self) {
        self.next = Self::start(&self.options, self.bound);
        self.yielded = 0;
    }

    fn remaining(&self) -> usize {
        let Some(next) = self.next else {
            return 0;
        };
        let left = match self.options.direction {
            Direction::Forwards => (self.bound - next) as usize,
            Direction::Backwards => next as usize + 1,
        };
        match self.options.max_count {
            Some(max) => left.min(max.saturating_sub(self.yielded)),
            None => left,
        }
    }
}

impl Iterator for StreamReader {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }
        let position = self.next?;
        let event = self.log.get(StreamPosition::from_raw(position))?;

        self.next = match self.options.direction {
            Direction::Forwards => Some(position + 1).filter(|p| *p < self.bound),
            Direction::Backwards => position.checked_sub(1),
        };
        self.yielded += 1;

        Some((*event).clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

// =============================================================================
// Tests
// =============================================================================
