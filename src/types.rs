//! # Domain Types for StreamStore
//!
//! Core types of the store: stream names, event identifiers, positions and
//! version expectations, and the input/output forms of events.
//!
//! ## Newtypes for Safety
//!
//! Positions are wrapped in single-field structs so that a [`CommitPosition`]
//! can never be passed where a [`StreamPosition`] is expected:
//!
//! ```rust
//! use streamstore::types::{CommitPosition, StreamPosition};
//!
//! fn example(commit: CommitPosition, position: StreamPosition) {
//!     // commit == position  // Won't compile
//! }
//! ```
//!
//! ## Invariants
//!
//! - [`StreamPosition`]: zero-based and gapless within a stream
//! - [`CommitPosition`]: strictly increasing across the whole store, one per
//!   event, never reused; `0` is the "before start" cursor and is never
//!   assigned to an event

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// Stream Identification
// =============================================================================

/// The caller-chosen name of an event stream, typically an aggregate id.
///
/// ```rust
/// use streamstore::types::StreamName;
///
/// let stream = StreamName::new("order-123456");
/// assert_eq!(stream.as_str(), "order-123456");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    /// Creates a stream name. Emptiness is checked at append time so that it
    /// surfaces as [`Error::InvalidRequest`] instead of a panic.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StreamName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StreamName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&StreamName> for StreamName {
    fn from(s: &StreamName) -> Self {
        s.clone()
    }
}

/// Caller-supplied unique identifier of an event, preserved verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh random identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Positions
// =============================================================================

/// Zero-based index of an event within its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamPosition(u64);

impl StreamPosition {
    /// Position of the first event of every stream.
    pub const FIRST: StreamPosition = StreamPosition(0);

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn add(&self, count: u64) -> Self {
        Self(self.0 + count)
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position in the store-wide commit order.
///
/// Every recorded event receives the next value exactly once. The first event
/// ever committed is at `1`; [`CommitPosition::START`] (`0`) is the cursor
/// value of a subscriber that has not yet seen anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitPosition(u64);

impl CommitPosition {
    /// The "before the first event" cursor.
    pub const START: CommitPosition = CommitPosition(0);

    /// The position assigned to the very first recorded event.
    pub const FIRST: CommitPosition = CommitPosition(1);

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn add(&self, count: u64) -> Self {
        Self(self.0 + count)
    }
}

impl fmt::Display for CommitPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Versions
// =============================================================================

/// Wire sentinel for [`ExpectedVersion::NoStream`].
pub const WIRE_NO_STREAM: i64 = -1;

/// Wire sentinel for [`ExpectedVersion::Any`].
pub const WIRE_ANY: i64 = -2;

/// What the caller believes the stream's current version to be.
///
/// Travels over the wire as a single integer: [`WIRE_NO_STREAM`],
/// [`WIRE_ANY`], or the non-negative position of the last event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "i64")]
pub enum ExpectedVersion {
    /// The stream must not exist yet.
    NoStream,
    /// No check at all.
    Any,
    /// The stream's last event must be at exactly this position.
    Exact(StreamPosition),
}

impl ExpectedVersion {
    /// Returns true if a stream currently at `current` satisfies this expectation.
    pub fn matches(&self, current: CurrentVersion) -> bool {
        match (self, current) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::NoStream, CurrentVersion::NoStream) => true,
            (ExpectedVersion::Exact(expected), CurrentVersion::At(actual)) => *expected == actual,
            _ => false,
        }
    }

    /// Positions above `i64::MAX` have no wire form; they would collide with
    /// the negative sentinels.
    pub fn to_wire(self) -> Result<i64> {
        match self {
            ExpectedVersion::NoStream => Ok(WIRE_NO_STREAM),
            ExpectedVersion::Any => Ok(WIRE_ANY),
            ExpectedVersion::Exact(position) => i64::try_from(position.as_raw()).map_err(|_| {
                Error::InvalidRequest(format!(
                    "expected version {} does not fit the wire encoding",
                    position
                ))
            }),
        }
    }

    pub fn from_wire(value: i64) -> Result<Self> {
        match value {
            WIRE_NO_STREAM => Ok(ExpectedVersion::NoStream),
            WIRE_ANY => Ok(ExpectedVersion::Any),
            n if n >= 0 => Ok(ExpectedVersion::Exact(StreamPosition::from_raw(n as u64))),
            n => Err(Error::InvalidRequest(format!(
                "expected version {} is neither a position nor a known sentinel",
                n
            ))),
        }
    }
}

impl Serialize for ExpectedVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let wire = self.to_wire().map_err(serde::ser::Error::custom)?;
        serializer.serialize_i64(wire)
    }
}

impl TryFrom<i64> for ExpectedVersion {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        ExpectedVersion::from_wire(value)
    }
}

impl From<StreamPosition> for ExpectedVersion {
    fn from(position: StreamPosition) -> Self {
        ExpectedVersion::Exact(position)
    }
}

impl From<u64> for ExpectedVersion {
    fn from(position: u64) -> Self {
        ExpectedVersion::Exact(StreamPosition::from_raw(position))
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedVersion::NoStream => write!(f, "no stream"),
            ExpectedVersion::Any => write!(f, "any"),
            ExpectedVersion::Exact(position) => write!(f, "{}", position),
        }
    }
}

/// The actual version of a stream: the position of its last event, or
/// `NoStream` if it has never been written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentVersion {
    NoStream,
    At(StreamPosition),
}

impl CurrentVersion {
    /// The position the next appended event will receive.
    pub fn next_position(&self) -> StreamPosition {
        match self {
            CurrentVersion::NoStream => StreamPosition::FIRST,
            CurrentVersion::At(position) => position.next(),
        }
    }

    pub fn position(&self) -> Option<StreamPosition> {
        match self {
            CurrentVersion::NoStream => None,
            CurrentVersion::At(position) => Some(*position),
        }
    }
}

impl fmt::Display for CurrentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentVersion::NoStream => write!(f, "no stream"),
            CurrentVersion::At(position) => write!(f, "{}", position),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// An event to be appended. Positions are assigned at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Unique id, generated by [`NewEvent::new`] or supplied via [`NewEvent::with_id`].
    pub id: EventId,

    /// Non-empty type tag, e.g. `"OrderCreated"`.
    pub event_type: String,

    /// Opaque payload; the store never looks inside.
    pub data: Vec<u8>,

    /// Opaque metadata (correlation ids and the like). May be empty.
    pub metadata: Vec<u8>,
}

impl NewEvent {
    /// Creates an event with a freshly generated id and no metadata.
    pub fn new(event_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            data: data.into(),
            metadata: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }
}

/// A recorded event with every position assigned. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub id: EventId,

    pub event_type: String,

    pub data: Vec<u8>,

    pub metadata: Vec<u8>,

    /// The stream this event belongs to.
    pub stream_name: StreamName,

    /// Zero-based index within the stream.
    pub stream_position: StreamPosition,

    /// Store-global commit position.
    pub commit_position: CommitPosition,

    /// Wall-clock time of the commit (Unix milliseconds). Informational only;
    /// ordering is defined by `commit_position`.
    pub recorded_at_ms: u64,
}

// =============================================================================
// Read and Subscribe Options
// =============================================================================

/// Direction of a stream read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forwards,
    Backwards,
}

/// Options for [`EventStore::read_stream`](crate::EventStore::read_stream).
///
/// ```rust
/// use streamstore::types::{ReadOptions, StreamPosition};
///
/// // The last ten events, newest first.
/// let options = ReadOptions::backwards().limit(10);
///
/// // Everything from position 5 on.
/// let options = ReadOptions::forwards().from(StreamPosition::from_raw(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Where to start; `None` is the first event (forwards) or the last (backwards).
    pub from: Option<StreamPosition>,

    pub direction: Direction,

    /// Upper bound on events returned; `None` reads to the end.
    pub max_count: Option<usize>,
}

impl ReadOptions {
    pub fn forwards() -> Self {
        Self::default()
    }

    pub fn backwards() -> Self {
        Self {
            direction: Direction::Backwards,
            ..Self::default()
        }
    }

    pub fn from(mut self, position: StreamPosition) -> Self {
        self.from = Some(position);
        self
    }

    pub fn limit(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }
}

/// Where a catch-up subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeFrom {
    /// From the very first event ever committed.
    Start,
    /// From the first event with `commit_position > p`. Callers resume with
    /// the last position they fully processed.
    After(CommitPosition),
}

impl SubscribeFrom {
    /// The cursor value the subscription starts with.
    pub fn cursor(&self) -> CommitPosition {
        match self {
            SubscribeFrom::Start => CommitPosition::START,
            SubscribeFrom::After(position) => *position,
        }
    }
}

impl From<Option<CommitPosition>> for SubscribeFrom {
    fn from(position: Option<CommitPosition>) -> Self {
        match position {
            Some(position) => SubscribeFrom::After(position),
            None => SubscribeFrom::Start,
        }
    }
}

pub(crate) fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
