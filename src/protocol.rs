//! # Wire Protocol
//!
//! Boundary types exchanged with a transport layer. The transport decodes
//! [`Request`]s, hands them to a [`Session`](crate::Session) and encodes the
//! [`Response`]s it gets back. Both are serde types; the JSON helpers below
//! are what the bundled tests and tools use.
//!
//! ```text
//! {"type":"append","payload":{"stream_name":"order-1","expected_version":-1,
//!   "events":[{"type":"OrderCreated","data":[123,125]}]}}
//!
//! {"type":"append_result","payload":{"commit_position":1}}
//! ```
//!
//! `expected_version` uses the integer encoding of [`ExpectedVersion`]:
//! `-1` for "stream must not exist", `-2` for "no check", `n >= 0` for an
//! exact position.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::subscription::SubscriptionId;
use crate::types::{
    CommitPosition, Direction, EventId, ExpectedVersion, NewEvent, ReadOptions, RecordedEvent,
    StreamName, StreamPosition,
};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Request {
    Append {
        stream_name: StreamName,
        expected_version: ExpectedVersion,
        events: Vec<WireNewEvent>,
    },
    Read {
        stream_name: StreamName,
        #[serde(default)]
        from_position: Option<u64>,
        #[serde(default)]
        direction: Direction,
        #[serde(default)]
        max_count: Option<usize>,
    },
    /// `from_position: None` subscribes from the start of the log.
    Subscribe {
        #[serde(default)]
        from_position: Option<u64>,
    },
    Unsubscribe {
        handle: SubscriptionId,
    },
}

impl Request {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    pub(crate) fn read_options(
        from_position: Option<u64>,
        direction: Direction,
        max_count: Option<usize>,
    ) -> ReadOptions {
        ReadOptions {
            from: from_position.map(StreamPosition::from_raw),
            direction,
            max_count,
        }
    }
}

/// An event as submitted by a client. A missing `id` gets a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireNewEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<u8>,
}

impl From<WireNewEvent> for NewEvent {
    fn from(wire: WireNewEvent) -> Self {
        let event = NewEvent::new(wire.event_type, wire.data).with_metadata(wire.metadata);
        match wire.id {
            Some(id) => event.with_id(id),
            None => event,
        }
    }
}

impl From<NewEvent> for WireNewEvent {
    fn from(event: NewEvent) -> Self {
        Self {
            id: Some(event.id),
            event_type: event.event_type,
            data: event.data,
            metadata: event.metadata,
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Response {
    AppendResult { commit_position: CommitPosition },
    /// One event of a read or a subscription.
    Event(WireEvent),
    /// Marks the end of the events answering a `Read`.
    ReadComplete,
    Subscribed { handle: SubscriptionId },
    Unsubscribed { handle: SubscriptionId },
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<&Error> for Response {
    fn from(error: &Error) -> Self {
        Response::Error {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<Error> for Response {
    fn from(error: Error) -> Self {
        Response::from(&error)
    }
}

/// A recorded event on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<u8>,
    pub stream_name: StreamName,
    pub stream_position: StreamPosition,
    pub commit_position: CommitPosition,
    pub recorded_at_ms: u64,
}

impl From<RecordedEvent> for WireEvent {
    fn from(event: RecordedEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            data: event.data,
            metadata: event.metadata,
            stream_name: event.stream_name,
            stream_position: event.stream_position,
            commit_position: event.commit_position,
            recorded_at_ms: event.recorded_at_ms,
        }
    }
}

/// Error category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConcurrencyConflict,
    StreamNotFound,
    InvalidRequest,
    SubscriptionClosed,
    Internal,
}
