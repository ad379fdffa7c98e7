//! # Catch-Up Subscriptions
//!
//! A catch-up subscription delivers every committed event, across all
//! streams, in commit order, starting after a caller-chosen position. It
//! covers the historical backlog and then keeps going with live commits,
//! with no seam a consumer could observe.
//!
//! ## The Catch-Up + Live Pattern
//!
//! ```text
//!  cursor = p                                  tail of the global log
//!     │                                                │
//!     ▼                                                ▼
//!  ┌──────────────────────────────────────┐  ┌──────────────────────────┐
//!  │  Catching up                         │  │  Live                    │
//!  │  read_after(cursor, batch) from the  │  │  per-subscriber bounded  │
//!  │  global log until it returns nothing │  │  queue fed by fan-out    │
//!  └──────────────────────────────────────┘  └──────────────────────────┘
//!                     │                                    │
//!                     └──── register(cursor == tail) ──────┘
//!                     ▲                                    │
//!                     └──────── evicted (queue full) ◄─────┘
//! ```
//!
//! ## No Missed Events, No Duplicates
//!
//! The commit path appends a batch to the global log *before* fanning it out
//! under the registry lock. Registration takes the registry lock and only
//! succeeds if the log's tail equals the subscriber's cursor. So every event
//! is either already in the log when the subscriber checks (and is read as
//! backlog) or is fanned out to it after it registered. An event can reach a
//! subscriber both ways at most in the narrow window around registration;
//! the consumer drops anything at or below its cursor.
//!
//! ## Backpressure
//!
//! The commit path never blocks on a subscriber. Fan-out uses `try_send`; a
//! subscriber whose queue is full is evicted from the registry. Once it has
//! drained what it already received, it notices the closed queue, goes back
//! to reading backlog from its cursor and re-registers when it is caught up.
//! Slow consumers cost memory in the global log only, never in the fan-out.
//!
//! ## Cancellation
//!
//! [`SubscriptionHandle::stop`] cancels a token and drops the subscriber's
//! registry entry. Either one wakes a consumer parked in `next().await` or
//! `blocking_next()`, which then ends the sequence.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::global_log::GlobalLog;
use crate::sync::lock;
use crate::types::{CommitPosition, RecordedEvent, StreamName, SubscribeFrom};

/// Identifier of one subscription, unique within a store.
pub type SubscriptionId = u64;

// =============================================================================
// Filter
// =============================================================================

/// Restricts which events a subscription yields.
///
/// Filtered-out events still advance the cursor, so
/// [`CatchUpSubscription::position`] is always safe to resume from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    stream: Option<StreamName>,
    stream_prefix: Option<String>,
    event_types: Option<Vec<String>>,
}

impl SubscriptionFilter {
    /// Every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only events of one stream.
    pub fn stream(name: impl Into<StreamName>) -> Self {
        Self {
            stream: Some(name.into()),
            ..Self::default()
        }
    }

    /// Only events of streams whose name starts with `prefix`.
    pub fn stream_prefix(prefix: impl Into<String>) -> Self {
        Self {
            stream_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Only events whose type is one of `types`.
    pub fn event_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().and_event_types(types)
    }

    /// Narrows an existing filter to the given event types.
    pub fn and_event_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, event: &RecordedEvent) -> bool {
        if let Some(ref stream) = self.stream {
            if &event.stream_name != stream {
                return false;
            }
        }
        if let Some(ref prefix) = self.stream_prefix {
            if !event.stream_name.as_str().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == &event.event_type) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Subscription Manager
// =============================================================================

struct Registry {
    live: HashMap<SubscriptionId, mpsc::Sender<Arc<RecordedEvent>>>,
}

/// Fans committed batches out to live subscribers and hands out
/// [`CatchUpSubscription`]s.
pub struct SubscriptionManager {
    log: Arc<GlobalLog>,
    registry: Mutex<Registry>,
    queue_capacity: usize,
    catchup_batch_size: usize,
    next_id: AtomicU64,
    active: AtomicUsize,
}

impl SubscriptionManager {
    pub fn new(log: Arc<GlobalLog>, queue_capacity: usize, catchup_batch_size: usize) -> Self {
        Self {
            log,
            registry: Mutex::new(Registry {
                live: HashMap::new(),
            }),
            queue_capacity: queue_capacity.max(1),
            catchup_batch_size: catchup_batch_size.max(1),
            next_id: AtomicU64::new(1),
            active: AtomicUsize::new(0),
        }
    }

    /// Starts a subscription. Nothing is read until the first `next` call.
    pub fn subscribe(
        self: &Arc<Self>,
        from: SubscribeFrom,
        filter: SubscriptionFilter,
    ) -> CatchUpSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        debug!(subscription = id, from = %from.cursor(), "subscription started");

        CatchUpSubscription {
            id,
            manager: Arc::clone(self),
            cursor: from.cursor(),
            filter,
            phase: Phase::CatchingUp,
            buffer: VecDeque::new(),
            token: CancellationToken::new(),
        }
    }

    /// Pushes a committed batch to every live subscriber.
    ///
    /// Called by the group commit, in commit order, after the batch was
    /// appended to the global log.
    pub(crate) fn publish(&self, batch: &[Arc<RecordedEvent>]) {
        let mut registry = lock(&self.registry);
        registry.live.retain(|id, tx| {
            for event in batch {
                match tx.try_send(Arc::clone(event)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            subscription = *id,
                            commit_position = %event.commit_position,
                            capacity = self.queue_capacity,
                            "subscriber queue full; falling back to catch-up"
                        );
                        return false;
                    }
                    Err(TrySendError::Closed(_)) => return false,
                }
            }
            true
        });
    }

    /// Registers a subscriber for live fan-out if nothing was committed past
    /// `cursor`. Returns `None` when there is backlog left to read.
    fn register(
        &self,
        id: SubscriptionId,
        cursor: CommitPosition,
    ) -> Option<mpsc::Receiver<Arc<RecordedEvent>>> {
        let mut registry = lock(&self.registry);
        if self.log.tail() > cursor {
            return None;
        }
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        registry.live.insert(id, tx);
        Some(rx)
    }

    fn unregister(&self, id: SubscriptionId) {
        lock(&self.registry).live.remove(&id);
    }

    /// Subscriptions that have been created and not yet dropped.
    pub fn subscriber_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Subscriptions currently registered for live fan-out.
    #[cfg(test)]
    fn live_count(&self) -> usize {
        lock(&self.registry).live.len()
    }
}

// =============================================================================
// Catch-Up Subscription
// =============================================================================

enum Phase {
    CatchingUp,
    Live(mpsc::Receiver<Arc<RecordedEvent>>),
    Ended,
}

enum Advance {
    Deliver(RecordedEvent),
    Wait,
    Ended,
}

/// An infinite, ordered, resumable feed of every committed event.
///
/// ```rust,no_run
/// # async fn example(store: streamstore::EventStore) {
/// use streamstore::types::SubscribeFrom;
///
/// let mut subscription = store.subscribe_to_all(SubscribeFrom::Start);
/// while let Some(event) = subscription.next().await {
///     // Process, then durably record event.commit_position to resume later.
///     println!("{} {}", event.commit_position, event.event_type);
/// }
/// # }
/// ```
pub struct CatchUpSubscription {
    id: SubscriptionId,
    manager: Arc<SubscriptionManager>,
    /// Last commit position delivered or skipped by the filter.
    cursor: CommitPosition,
    filter: SubscriptionFilter,
    phase: Phase,
    buffer: VecDeque<Arc<RecordedEvent>>,
    token: CancellationToken,
}

impl CatchUpSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The commit position of the last event this subscription moved past.
    pub fn position(&self) -> CommitPosition {
        self.cursor
    }

    pub fn is_live(&self) -> bool {
        matches!(self.phase, Phase::Live(_))
    }

    /// A handle that can stop this subscription from any thread.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            id: self.id,
            token: self.token.clone(),
            manager: Arc::clone(&self.manager),
        }
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Waits for the next event. Returns `None` only once stopped.
    pub async fn next(&mut self) -> Option<RecordedEvent> {
        loop {
            match self.advance() {
                Advance::Deliver(event) => return Some(event),
                Advance::Ended => return None,
                Advance::Wait => {
                    let Phase::Live(rx) = &mut self.phase else {
                        continue;
                    };
                    let received = tokio::select! {
                        biased;
                        _ = self.token.cancelled() => None,
                        received = rx.recv() => received,
                    };
                    self.on_received(received);
                }
            }
        }
    }

    /// Blocking variant of [`next`](Self::next) for synchronous consumers.
    ///
    /// Parks the calling thread. Must not be called from within an async
    /// runtime.
    pub fn blocking_next(&mut self) -> Option<RecordedEvent> {
        loop {
            match self.advance() {
                Advance::Deliver(event) => return Some(event),
                Advance::Ended => return None,
                Advance::Wait => {
                    let Phase::Live(rx) = &mut self.phase else {
                        continue;
                    };
                    let received = rx.blocking_recv();
                    self.on_received(received);
                }
            }
        }
    }

    /// Adapts the subscription into a [`futures::Stream`].
    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = RecordedEvent> + Send>> {
        Box::pin(futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|event| (event, subscription))
        }))
    }

    /// Makes progress without waiting.
    fn advance(&mut self) -> Advance {
        loop {
            if self.token.is_cancelled() {
                self.end();
                return Advance::Ended;
            }

            while let Some(event) = self.buffer.pop_front() {
                if event.commit_position <= self.cursor {
                    continue;
                }
                self.cursor = event.commit_position;
                if self.filter.matches(&event) {
                    return Advance::Deliver((*event).clone());
                }
            }

            match &mut self.phase {
                Phase::CatchingUp => {
                    let backlog = self
                        .manager
                        .log
                        .read_after(self.cursor, self.manager.catchup_batch_size);
                    if !backlog.is_empty() {
                        self.buffer.extend(backlog);
                        continue;
                    }
                    if let Some(rx) = self.manager.register(self.id, self.cursor) {
                        debug!(subscription = self.id, cursor = %self.cursor, "subscription live");
                        self.phase = Phase::Live(rx);
                    }
                }
                Phase::Live(rx) => match rx.try_recv() {
                    Ok(event) => self.buffer.push_back(event),
                    Err(TryRecvError::Empty) => return Advance::Wait,
                    Err(TryRecvError::Disconnected) => self.on_received(None),
                },
                Phase::Ended => return Advance::Ended,
            }
        }
    }

    fn on_received(&mut self, received: Option<Arc<RecordedEvent>>) {
        match received {
            Some(event) => self.buffer.push_back(event),
            None if self.token.is_cancelled() => self.end(),
            None => {
                // Evicted by fan-out; whatever was queued has been drained.
                debug!(subscription = self.id, cursor = %self.cursor, "subscription catching up");
                self.phase = Phase::CatchingUp;
            }
        }
    }

    fn end(&mut self) {
        if !matches!(self.phase, Phase::Ended) {
            debug!(subscription = self.id, cursor = %self.cursor, "subscription stopped");
            self.phase = Phase::Ended;
            self.buffer.clear();
            self.manager.unregister(self.id);
        }
    }
}

impl Drop for CatchUpSubscription {
    fn drop(&mut self) {
        self.manager.unregister(self.id);
        self.manager.active.fetch_sub(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// Stops a subscription from anywhere. Cheap to clone.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    token: CancellationToken,
    manager: Arc<SubscriptionManager>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Ends the subscription. Idempotent; wakes a blocked consumer.
    pub fn stop(&self) {
        self.token.cancel();
        self.manager.unregister(self.id);
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`stop`](Self::stop) was called on any clone.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
