//! # Group Commit
//!
//! Every validated append ends up here to be made durable and visible. The
//! journal is written by one appender at a time, and appends that arrive
//! while it is busy are committed together by whoever gets it next:
//!
//! ```text
//!  append A ──► queue ──► journal free, A leads ──► drain [A] ───► persist ─► advance ─► publish
//!  append B ──► queue ──► wait for journal ─┐
//!  append C ──► queue ──► wait for journal ─┴──► B leads ─► drain [B, C] ─► persist ─► ...
//!                                                C finds its result waiting
//! ```
//!
//! A group costs one `persist` call, so with SQLite one transaction and one
//! sync, however many appends it carries.
//!
//! ## Staged vs Committed
//!
//! A group is numbered from [`GlobalSequencer::next_position`] without moving
//! the head. Only after `persist` returned `Ok` does the leader call
//! [`GlobalSequencer::advance`] and publish the group to its streams, the
//! global log and live subscribers. Memory never leads the journal, and a
//! failed group consumes no position.
//!
//! ## Failure Isolation
//!
//! When a group with several appends fails, each append is retried on its
//! own, renumbered from the unchanged head. Only appends whose own write
//! fails get an error.

use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::global_log::GlobalLog;
use crate::journal::Journal;
use crate::sequencer::GlobalSequencer;
use crate::stream_log::StreamLog;
use crate::subscription::SubscriptionManager;
use crate::sync::lock;
use crate::types::{CommitPosition, RecordedEvent};

type Receipt = Result<Vec<Arc<RecordedEvent>>>;

/// An append waiting for the journal.
struct PendingAppend {
    stream: Arc<StreamLog>,
    /// Stream positions assigned; commit positions are set per attempt.
    events: Vec<RecordedEvent>,
    reply: mpsc::SyncSender<Receipt>,
}

pub(crate) struct GroupCommitter {
    journal: Mutex<Box<dyn Journal>>,
    journal_name: &'static str,
    queue: Mutex<Vec<PendingAppend>>,
    sequencer: GlobalSequencer,
    log: Arc<GlobalLog>,
    subscriptions: Arc<SubscriptionManager>,
    max_group_size: usize,
}

impl GroupCommitter {
    pub(crate) fn new(
        journal: Box<dyn Journal>,
        head: CommitPosition,
        log: Arc<GlobalLog>,
        subscriptions: Arc<SubscriptionManager>,
        max_group_size: usize,
    ) -> Self {
        Self {
            journal_name: journal.name(),
            journal: Mutex::new(journal),
            queue: Mutex::new(Vec::new()),
            sequencer: GlobalSequencer::new(head),
            log,
            subscriptions,
            max_group_size: max_group_size.max(1),
        }
    }

    pub(crate) fn sequencer(&self) -> &GlobalSequencer {
        &self.sequencer
    }

    pub(crate) fn journal_name(&self) -> &'static str {
        self.journal_name
    }

    /// Commits one stream's staged batch and returns it as published.
    ///
    /// The caller holds the stream's writer lock, so a group never carries
    /// two batches of the same stream.
    pub(crate) fn submit(&self, stream: Arc<StreamLog>, events: Vec<RecordedEvent>) -> Receipt {
        let (reply, receipt) = mpsc::sync_channel(1);
        lock(&self.queue).push(PendingAppend {
            stream,
            events,
            reply,
        });

        let mut journal = lock(&self.journal);
        loop {
            match receipt.try_recv() {
                Ok(result) => return result,
                Err(TryRecvError::Disconnected) => {
                    return Err(Error::Schema(
                        "append was dropped by an interrupted group commit".to_string(),
                    ));
                }
                // Still queued: lead the next group.
                Err(TryRecvError::Empty) => {
                    let group = self.take_group();
                    self.commit_group(&mut **journal, group);
                }
            }
        }
    }

    fn take_group(&self) -> Vec<PendingAppend> {
        let mut queue = lock(&self.queue);
        let size = queue.len().min(self.max_group_size);
        queue.drain(..size).collect()
    }

    fn commit_group(&self, journal: &mut dyn Journal, mut group: Vec<PendingAppend>) {
        let error = match self.persist(journal, &mut group) {
            Ok(()) => return self.publish(group),
            Err(error) => error,
        };

        if group.len() == 1 {
            if let Some(pending) = group.pop() {
                fail(pending, error);
            }
            return;
        }

        warn!(
            appends = group.len(),
            error = %error,
            "group commit failed; retrying appends one by one"
        );
        for pending in group {
            let mut single = vec![pending];
            match self.persist(journal, &mut single) {
                Ok(()) => self.publish(single),
                Err(error) => {
                    if let Some(pending) = single.pop() {
                        fail(pending, error);
                    }
                }
            }
        }
    }

    /// Numbers `group` from the next free position and persists it in one call.
    fn persist(&self, journal: &mut dyn Journal, group: &mut [PendingAppend]) -> Result<()> {
        let first = self.sequencer.next_position();
        let counts: Vec<usize> = group.iter().map(|pending| pending.events.len()).collect();

        let mut events = Vec::with_capacity(counts.iter().sum());
        for pending in group.iter_mut() {
            events.append(&mut pending.events);
        }
        for (offset, event) in events.iter_mut().enumerate() {
            event.commit_position = first.add(offset as u64);
        }

        let result = journal.persist(&events);

        // Hand every append its events back, whatever the outcome.
        let mut events = events.into_iter();
        for (pending, count) in group.iter_mut().zip(counts) {
            pending.events.extend(events.by_ref().take(count));
        }
        result
    }

    /// Advances the head past a durable group and makes it visible.
    fn publish(&self, group: Vec<PendingAppend>) {
        let total: usize = group.iter().map(|pending| pending.events.len()).sum();
        let first = self.sequencer.advance(total as u64);
        debug_assert_eq!(
            group.first().and_then(|pending| pending.events.first()).map(|e| e.commit_position),
            Some(first)
        );

        let mut published = Vec::with_capacity(total);
        let mut receipts = Vec::with_capacity(group.len());
        for pending in group {
            let batch: Vec<Arc<RecordedEvent>> = pending.events.into_iter().map(Arc::new).collect();
            pending.stream.extend(&batch);
            published.extend(batch.iter().cloned());
            receipts.push((pending.reply, batch));
        }

        self.log.extend(&published);
        self.subscriptions.publish(&published);

        if receipts.len() > 1 {
            debug!(appends = receipts.len(), events = total, first = %first, "group committed");
        }
        for (reply, batch) in receipts {
            let _ = reply.send(Ok(batch));
        }
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        lock(&self.queue).len()
    }
}

/// Answers a failed append. The stream handle is released first so the
/// caller sees only its own reference once it wakes up.
fn fail(pending: PendingAppend, error: Error) {
    let PendingAppend { stream, reply, .. } = pending;
    drop(stream);
    let _ = reply.send(Err(error));
}

// =============================================================================
// Tests
// =============================================================================
