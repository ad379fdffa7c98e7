//! # Public API for StreamStore
//!
//! [`EventStore`] ties the pieces together: a lazily populated map of
//! [`StreamLog`]s, the group committer with its journal and
//! [`GlobalSequencer`](crate::sequencer::GlobalSequencer), the store-wide
//! [`GlobalLog`] and the [`SubscriptionManager`].
//!
//! ## The Commit Path
//!
//! ```text
//! append_to_stream("order-1", expected, batch)
//!     │
//!     ▼
//! ┌──────────────┐   ┌──────────── group commit (one leader at a time) ─────────────┐
//! │ StreamLog    │   │                                                              │
//! │ writer lock  ├──►│ queue ─► journal.persist(group) ─► sequencer.advance ─►      │
//! │ version check│   │          stream.events ─► global log ─► subscriber fan-out   │
//! └──────────────┘   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Batches are published in commit order by the group's leader, so any
//! observer (stream reader, `read_all`, subscriber) sees them appear whole
//! and in order. The sequencer's lock covers only the counter bump.
//!
//! ## Lock Order
//!
//! `stream.writer` → `journal` → `sequencer` → `stream.events` →
//! `global_log` → `registry`. The commit queue is only held to push or
//! drain. A subscriber going live takes `registry` → `global_log` (read),
//! which never waits on the journal, so the two paths cannot deadlock.
//!
//! ## Synchronous Calls
//!
//! Appends block until their batch is durable; everything else is a few
//! lock acquisitions. The API is synchronous and callable from both threads
//! and async tasks. Only waiting for new events
//! ([`CatchUpSubscription::next`]) is async.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::committer::GroupCommitter;
use crate::config::{StorageConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::global_log::GlobalLog;
use crate::journal::{Journal, MemoryJournal, SqliteJournal};
use crate::stream_log::{StreamLog, StreamReader};
use crate::subscription::{CatchUpSubscription, SubscriptionFilter, SubscriptionManager};
use crate::sync::{read, write};
use crate::types::{
    CommitPosition, CurrentVersion, ExpectedVersion, NewEvent, ReadOptions, RecordedEvent,
    StreamName, StreamPosition, SubscribeFrom,
};

// =============================================================================
// EventStore - The Main Handle
// =============================================================================

struct Inner {
    config: StoreConfig,
    streams: RwLock<HashMap<StreamName, Arc<StreamLog>>>,
    committer: GroupCommitter,
    log: Arc<GlobalLog>,
    subscriptions: Arc<SubscriptionManager>,
}

/// The main handle for StreamStore operations.
///
/// # Thread Safety
///
/// `EventStore` is `Clone`, `Send`, and `Sync`. All clones share the same
/// streams, sequencer and subscribers.
///
/// # Example
///
/// ```rust
/// use streamstore::{EventStore, ExpectedVersion, NewEvent, ReadOptions};
///
/// let store = EventStore::in_memory();
/// let position = store
///     .append_event("order-1", ExpectedVersion::NoStream, NewEvent::new("OrderCreated", b"{}".to_vec()))
///     .unwrap();
/// assert_eq!(position.as_raw(), 1);
///
/// let events: Vec<_> = store.read_stream("order-1", ReadOptions::forwards()).unwrap().collect();
/// assert_eq!(events[0].event_type, "OrderCreated");
/// ```
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<Inner>,
}

impl EventStore {
    /// Creates an empty, non-durable store with default settings.
    pub fn in_memory() -> Self {
        Self::build(StoreConfig::default(), Box::new(MemoryJournal), Vec::new())
    }

    /// Opens a store as described by `config`.
    ///
    /// With [`StorageConfig::Sqlite`] the database file is created if needed
    /// and every persisted event is recovered before this returns.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let journal: Box<dyn Journal> = match &config.storage {
            StorageConfig::InMemory => Box::new(MemoryJournal),
            StorageConfig::Sqlite { path } => Box::new(SqliteJournal::open(path)?),
        };
        Self::with_journal(config, journal)
    }

    /// Opens a store on top of an arbitrary journal, recovering its contents.
    pub fn with_journal(config: StoreConfig, mut journal: Box<dyn Journal>) -> Result<Self> {
        config.validate()?;
        let recovered = journal.recover()?;
        check_recovered(&recovered)?;

        info!(
            journal = journal.name(),
            events = recovered.len(),
            "event store opened"
        );
        Ok(Self::build(config, journal, recovered))
    }

    fn build(config: StoreConfig, journal: Box<dyn Journal>, recovered: Vec<RecordedEvent>) -> Self {
        let head = CommitPosition::from_raw(recovered.len() as u64);
        let log = Arc::new(GlobalLog::new());
        let mut streams: HashMap<StreamName, Arc<StreamLog>> = HashMap::new();

        let recovered: Vec<Arc<RecordedEvent>> = recovered.into_iter().map(Arc::new).collect();
        for event in &recovered {
            streams
                .entry(event.stream_name.clone())
                .or_insert_with(|| Arc::new(StreamLog::new(event.stream_name.clone())))
                .restore(Arc::clone(event));
        }
        log.extend(&recovered);
        if !recovered.is_empty() {
            info!(streams = streams.len(), head = %head, "recovered persisted events");
        }

        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&log),
            config.subscriber_queue_capacity,
            config.catchup_batch_size,
        ));

        let committer = GroupCommitter::new(
            journal,
            head,
            Arc::clone(&log),
            Arc::clone(&subscriptions),
            config.commit_group_size,
        );

        Self {
            inner: Arc::new(Inner {
                config,
                streams: RwLock::new(streams),
                committer,
                log,
                subscriptions,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends a batch of events to a stream, atomically.
    ///
    /// Returns the commit position of the batch's last event. Either every
    /// event becomes visible with consecutive stream and commit positions, or
    /// nothing does and no commit position is consumed.
    ///
    /// # Errors
    ///
    /// - `Error::ConcurrencyConflict` if the stream is not at `expected`
    /// - `Error::InvalidRequest` for an empty name, an empty batch, an empty
    ///   event type or a repeated event id within the batch
    /// - `Error::Sqlite` if the durable write failed
    pub fn append_to_stream(
        &self,
        stream: impl Into<StreamName>,
        expected: ExpectedVersion,
        events: Vec<NewEvent>,
    ) -> Result<CommitPosition> {
        let stream = stream.into();
        validate_append(&stream, &events)?;

        let log = match self.stream_log(&stream) {
            Some(log) => log,
            // An exact version can never match a stream that doesn't exist.
            None if matches!(expected, ExpectedVersion::Exact(_)) => {
                return Err(Error::ConcurrencyConflict {
                    stream,
                    expected,
                    actual: CurrentVersion::NoStream,
                });
            }
            None => self.get_or_create(&stream),
        };

        let result = match log.append(expected, events, &self.inner.committer) {
            Ok(result) => result,
            Err(error) => {
                self.release_if_unused(&stream, log);
                return Err(error);
            }
        };

        debug!(
            stream = %stream,
            count = result.event_count(),
            last_position = %result.last_position,
            commit_position = %result.last_commit,
            "committed"
        );
        Ok(result.last_commit)
    }

    /// Appends a single event. See [`append_to_stream`](Self::append_to_stream).
    pub fn append_event(
        &self,
        stream: impl Into<StreamName>,
        expected: ExpectedVersion,
        event: NewEvent,
    ) -> Result<CommitPosition> {
        self.append_to_stream(stream, expected, vec![event])
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads one stream lazily.
    ///
    /// The reader covers the events visible when it was created. Reading from
    /// a position past the end yields nothing.
    ///
    /// # Errors
    ///
    /// - `Error::StreamNotFound` if nothing was ever committed to `stream`
    pub fn read_stream(
        &self,
        stream: impl Into<StreamName>,
        options: ReadOptions,
    ) -> Result<StreamReader> {
        let stream = stream.into();
        match self.stream_log(&stream) {
            Some(log) if !log.is_empty() => Ok(log.read(options)),
            _ => Err(Error::StreamNotFound { stream }),
        }
    }

    /// The position of the stream's last event, or `NoStream`.
    pub fn get_current_version(&self, stream: impl Into<StreamName>) -> CurrentVersion {
        self.stream_log(&stream.into())
            .map(|log| log.current_version())
            .unwrap_or(CurrentVersion::NoStream)
    }

    /// Reads the store-wide log: up to `limit` events with a commit position
    /// greater than `after`, in commit order.
    pub fn read_all(&self, after: CommitPosition, limit: usize) -> Vec<RecordedEvent> {
        self.inner
            .log
            .read_after(after, limit)
            .into_iter()
            .map(|event| (*event).clone())
            .collect()
    }

    /// The last commit position assigned (`CommitPosition::START` when empty).
    pub fn head_position(&self) -> CommitPosition {
        self.inner.log.tail()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes to every event committed after `from`, past and future.
    pub fn subscribe_to_all(&self, from: SubscribeFrom) -> CatchUpSubscription {
        self.subscribe_with(from, SubscriptionFilter::all())
    }

    /// Like [`subscribe_to_all`](Self::subscribe_to_all), yielding only the
    /// events `filter` matches.
    pub fn subscribe_with(&self, from: SubscribeFrom, filter: SubscriptionFilter) -> CatchUpSubscription {
        self.inner.subscriptions.subscribe(from, filter)
    }

    /// Subscriptions that have been created and not yet dropped.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.subscriber_count()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn stream_log(&self, stream: &StreamName) -> Option<Arc<StreamLog>> {
        read(&self.inner.streams).get(stream).cloned()
    }

    fn get_or_create(&self, stream: &StreamName) -> Arc<StreamLog> {
        let mut streams = write(&self.inner.streams);
        Arc::clone(
            streams
                .entry(stream.clone())
                .or_insert_with(|| Arc::new(StreamLog::new(stream.clone()))),
        )
    }

    /// Forgets a stream log that a failed append created, unless it has
    /// events or someone else (a concurrent appender, a reader) holds it.
    fn release_if_unused(&self, stream: &StreamName, log: Arc<StreamLog>) {
        let mut streams = write(&self.inner.streams);
        let registered = streams
            .get(stream)
            .is_some_and(|entry| Arc::ptr_eq(entry, &log));
        // One reference in the map, one here.
        if registered && log.is_empty() && Arc::strong_count(&log) == 2 {
            streams.remove(stream);
        }
    }

    #[cfg(test)]
    fn stream_count(&self) -> usize {
        read(&self.inner.streams).len()
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("head", &self.head_position())
            .field("streams", &read(&self.inner.streams).len())
            .field("journal", &self.inner.committer.journal_name())
            .finish()
    }
}

/// Rejects malformed appends before any lock is taken.
fn validate_append(stream: &StreamName, events: &[NewEvent]) -> Result<()> {
    if stream.is_empty() {
        return Err(Error::InvalidRequest("stream name must not be empty".to_string()));
    }
    if events.is_empty() {
        return Err(Error::InvalidRequest(format!(
            "append to '{}' carries no events",
            stream
        )));
    }

    let mut ids = HashSet::with_capacity(events.len());
    for event in events {
        if event.event_type.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "event {} has an empty event type",
                event.id
            )));
        }
        if !ids.insert(event.id) {
            return Err(Error::InvalidRequest(format!(
                "event id {} appears twice in one batch",
                event.id
            )));
        }
    }
    Ok(())
}

/// Verifies recovered events form gapless commit and stream sequences.
fn check_recovered(events: &[RecordedEvent]) -> Result<()> {
    let mut next_stream_position: HashMap<&StreamName, StreamPosition> = HashMap::new();

    for (index, event) in events.iter().enumerate() {
        let expected_commit = CommitPosition::from_raw(index as u64 + 1);
        if event.commit_position != expected_commit {
            return Err(Error::Schema(format!(
                "commit position gap: expected {}, found {}",
                expected_commit, event.commit_position
            )));
        }

        let expected_position = next_stream_position
            .entry(&event.stream_name)
            .or_insert(StreamPosition::FIRST);
        if event.stream_position != *expected_position {
            return Err(Error::Schema(format!(
                "stream '{}' position gap at commit {}: expected {}, found {}",
                event.stream_name, event.commit_position, expected_position, event.stream_position
            )));
        }
        *expected_position = expected_position.next();
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, EventId};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn event(event_type: &str) -> NewEvent {
        NewEvent::new(event_type, event_type.as_bytes().to_vec())
    }

    fn recorded(stream: &str, stream_position: u64, commit: u64) -> RecordedEvent {
        RecordedEvent {
            id: EventId::new(),
            event_type: "T".to_string(),
            data: Vec::new(),
            metadata: Vec::new(),
            stream_name: StreamName::new(stream),
            stream_position: StreamPosition::from_raw(stream_position),
            commit_position: CommitPosition::from_raw(commit),
            recorded_at_ms: 0,
        }
    }

    /// Journal that can be switched into failing mode.
    struct FlakyJournal {
        failing: Arc<AtomicBool>,
    }

    impl Journal for FlakyJournal {
        fn persist(&mut self, _batch: &[RecordedEvent]) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(Error::Schema("journal unavailable".to_string()))
            } else {
                Ok(())
            }
        }

        fn recover(&mut self) -> Result<Vec<RecordedEvent>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Journal that hands back a fixed recovery set.
    struct ReplayJournal(Vec<RecordedEvent>);

    impl Journal for ReplayJournal {
        fn persist(&mut self, _batch: &[RecordedEvent]) -> Result<()> {
            Ok(())
        }

        fn recover(&mut self) -> Result<Vec<RecordedEvent>> {
            Ok(std::mem::take(&mut self.0))
        }

        fn name(&self) -> &'static str {
            "replay"
        }
    }

    #[test]
    fn test_append_and_read() {
        let store = EventStore::in_memory();

        let commit = store
            .append_to_stream(
                "order-1",
                ExpectedVersion::NoStream,
                vec![event("OrderCreated"), event("OrderSubmitted")],
            )
            .unwrap();
        assert_eq!(commit.as_raw(), 2);
        assert_eq!(
            store.get_current_version("order-1"),
            CurrentVersion::At(StreamPosition::from_raw(1))
        );

        let events: Vec<_> = store
            .read_stream("order-1", ReadOptions::forwards())
            .unwrap()
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "OrderCreated");
        assert_eq!(events[0].stream_position, StreamPosition::FIRST);
        assert_eq!(events[1].commit_position.as_raw(), 2);
    }

    #[test]
    fn test_commit_positions_interleave_across_streams() {
        let store = EventStore::in_memory();
        store.append_event("a", ExpectedVersion::Any, event("A1")).unwrap();
        store.append_event("b", ExpectedVersion::Any, event("B1")).unwrap();
        store.append_event("a", ExpectedVersion::Any, event("A2")).unwrap();

        let all = store.read_all(CommitPosition::START, 10);
        let order: Vec<(&str, u64, u64)> = all
            .iter()
            .map(|e| (e.event_type.as_str(), e.stream_position.as_raw(), e.commit_position.as_raw()))
            .collect();
        assert_eq!(order, vec![("A1", 0, 1), ("B1", 0, 2), ("A2", 1, 3)]);
        assert_eq!(store.head_position().as_raw(), 3);
    }

    #[test]
    fn test_conflict_leaves_state_untouched() {
        let store = EventStore::in_memory();
        store.append_event("s", ExpectedVersion::NoStream, event("first")).unwrap();

        let err = store
            .append_event("s", ExpectedVersion::NoStream, event("second"))
            .unwrap_err();
        assert!(err.is_conflict());
        match err {
            Error::ConcurrencyConflict { actual, .. } => {
                assert_eq!(actual, CurrentVersion::At(StreamPosition::FIRST));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(store.head_position().as_raw(), 1);
        assert_eq!(store.read_stream("s", ReadOptions::forwards()).unwrap().count(), 1);
    }

    #[test]
    fn test_exact_version_on_missing_stream_conflicts() {
        let store = EventStore::in_memory();
        let err = store
            .append_event("ghost", ExpectedVersion::Exact(StreamPosition::FIRST), event("x"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConcurrencyConflict {
                actual: CurrentVersion::NoStream,
                ..
            }
        ));
        assert!(matches!(
            store.read_stream("ghost", ReadOptions::forwards()),
            Err(Error::StreamNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_appends_are_rejected() {
        let store = EventStore::in_memory();

        let empty_name = store.append_event("", ExpectedVersion::Any, event("x"));
        assert!(matches!(empty_name, Err(Error::InvalidRequest(_))));

        let empty_batch = store.append_to_stream("s", ExpectedVersion::Any, Vec::new());
        assert!(matches!(empty_batch, Err(Error::InvalidRequest(_))));

        let empty_type = store.append_event("s", ExpectedVersion::Any, NewEvent::new("", Vec::new()));
        assert!(matches!(empty_type, Err(Error::InvalidRequest(_))));

        let id = EventId::new();
        let duplicate = store.append_to_stream(
            "s",
            ExpectedVersion::Any,
            vec![event("a").with_id(id), event("b").with_id(id)],
        );
        assert!(matches!(duplicate, Err(Error::InvalidRequest(_))));

        assert_eq!(store.head_position(), CommitPosition::START);
        assert_eq!(store.get_current_version("s"), CurrentVersion::NoStream);
    }

    #[test]
    fn test_failed_persist_consumes_nothing() {
        let failing = Arc::new(AtomicBool::new(false));
        let store = EventStore::with_journal(
            StoreConfig::default(),
            Box::new(FlakyJournal {
                failing: Arc::clone(&failing),
            }),
        )
        .unwrap();

        store.append_event("s", ExpectedVersion::NoStream, event("kept")).unwrap();

        failing.store(true, Ordering::SeqCst);
        let err = store
            .append_to_stream("s", ExpectedVersion::Any, vec![event("lost-1"), event("lost-2")])
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(store.head_position().as_raw(), 1);
        assert_eq!(store.get_current_version("s"), CurrentVersion::At(StreamPosition::FIRST));

        failing.store(false, Ordering::SeqCst);
        let commit = store.append_event("s", ExpectedVersion::Any, event("next")).unwrap();
        assert_eq!(commit.as_raw(), 2);
    }

    #[test]
    fn test_failed_append_to_new_stream_leaves_no_stream_behind() {
        let failing = Arc::new(AtomicBool::new(true));
        let store = EventStore::with_journal(
            StoreConfig::default(),
            Box::new(FlakyJournal {
                failing: Arc::clone(&failing),
            }),
        )
        .unwrap();

        for i in 0..10 {
            let result = store.append_event(format!("fresh-{}", i), ExpectedVersion::Any, event("x"));
            assert!(matches!(result, Err(Error::Schema(_))));
        }
        assert_eq!(store.stream_count(), 0);
        assert_eq!(store.get_current_version("fresh-0"), CurrentVersion::NoStream);
        assert!(matches!(
            store.read_stream("fresh-0", ReadOptions::forwards()),
            Err(Error::StreamNotFound { .. })
        ));

        failing.store(false, Ordering::SeqCst);
        store.append_event("fresh-0", ExpectedVersion::NoStream, event("x")).unwrap();
        assert_eq!(store.stream_count(), 1);
        assert_eq!(store.head_position().as_raw(), 1);
    }

    #[test]
    fn test_failed_append_keeps_existing_stream() {
        let failing = Arc::new(AtomicBool::new(false));
        let store = EventStore::with_journal(
            StoreConfig::default(),
            Box::new(FlakyJournal {
                failing: Arc::clone(&failing),
            }),
        )
        .unwrap();
        store.append_event("s", ExpectedVersion::NoStream, event("kept")).unwrap();

        failing.store(true, Ordering::SeqCst);
        assert!(store.append_event("s", ExpectedVersion::Any, event("lost")).is_err());
        assert_eq!(store.stream_count(), 1);
        assert_eq!(store.read_stream("s", ReadOptions::forwards()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_policies() {
        let store = EventStore::in_memory();
        assert!(matches!(
            store.read_stream("nope", ReadOptions::forwards()),
            Err(Error::StreamNotFound { .. })
        ));

        store
            .append_to_stream("s", ExpectedVersion::NoStream, vec![event("a"), event("b"), event("c")])
            .unwrap();

        let past_end = store
            .read_stream("s", ReadOptions::forwards().from(StreamPosition::from_raw(10)))
            .unwrap();
        assert_eq!(past_end.count(), 0);

        let backwards: Vec<String> = store
            .read_stream("s", ReadOptions::backwards())
            .unwrap()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(backwards, vec!["c", "b", "a"]);

        let options = ReadOptions::forwards().from(StreamPosition::from_raw(1)).limit(1);
        assert_eq!(options.direction, Direction::Forwards);
        let one: Vec<String> = store.read_stream("s", options).unwrap().map(|e| e.event_type).collect();
        assert_eq!(one, vec!["b"]);
    }

    #[test]
    fn test_recovery_rebuilds_state() {
        let journal = ReplayJournal(vec![recorded("a", 0, 1), recorded("b", 0, 2), recorded("a", 1, 3)]);
        let store = EventStore::with_journal(StoreConfig::default(), Box::new(journal)).unwrap();

        assert_eq!(store.head_position().as_raw(), 3);
        assert_eq!(
            store.get_current_version("a"),
            CurrentVersion::At(StreamPosition::from_raw(1))
        );
        let commit = store
            .append_event("b", ExpectedVersion::Exact(StreamPosition::FIRST), event("B2"))
            .unwrap();
        assert_eq!(commit.as_raw(), 4);
    }

    #[test]
    fn test_recovery_rejects_gaps() {
        let commit_gap = ReplayJournal(vec![recorded("a", 0, 1), recorded("a", 1, 3)]);
        assert!(matches!(
            EventStore::with_journal(StoreConfig::default(), Box::new(commit_gap)),
            Err(Error::Schema(_))
        ));

        let stream_gap = ReplayJournal(vec![recorded("a", 0, 1), recorded("a", 2, 2)]);
        assert!(matches!(
            EventStore::with_journal(StoreConfig::default(), Box::new(stream_gap)),
            Err(Error::Schema(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_sees_backlog_and_live() {
        let store = EventStore::in_memory();
        store.append_event("s", ExpectedVersion::Any, event("old")).unwrap();

        let mut subscription = store.subscribe_to_all(SubscribeFrom::Start);
        assert_eq!(store.subscriber_count(), 1);

        let old = tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.event_type, "old");

        let writer = store.clone();
        tokio::spawn(async move {
            writer.append_event("s", ExpectedVersion::Any, event("new")).unwrap();
        });
        let new = tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(new.event_type, "new");
        assert_eq!(subscription.position().as_raw(), 2);

        drop(subscription);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = StoreConfig::in_memory().with_subscriber_queue_capacity(0);
        assert!(matches!(EventStore::open(config), Err(Error::Config(_))));
    }
}
