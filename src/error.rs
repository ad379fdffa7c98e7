//! # Error Handling for StreamStore
//!
//! A single error enum ([`Error`]) covers every failure mode of the store. The
//! categories map one-to-one onto what a caller is expected to do:
//!
//! | Category | Variant | Typical Response |
//! |----------|---------|------------------|
//! | Conflict | [`Error::ConcurrencyConflict`] | Re-read current version, retry |
//! | Lookup | [`Error::StreamNotFound`] | Treat as "no history yet" |
//! | Rejected | [`Error::InvalidRequest`] | Fix the request; nothing was written |
//! | Lifecycle | [`Error::SubscriptionClosed`] | Not an application error |
//! | Internal | [`Error::Sqlite`], [`Error::Schema`], [`Error::Config`] | Log and investigate |
//!
//! The store never retries on behalf of the caller. A failed append leaves the
//! stream's current version and the global commit counter exactly as they were.

use thiserror::Error;

use crate::protocol::ErrorKind;
use crate::types::{CurrentVersion, ExpectedVersion, StreamName};

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur in StreamStore operations.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Conflict Errors (Client can retry with updated data)
    // =========================================================================

    /// Optimistic concurrency conflict: the stream's actual current version
    /// did not match the version the caller expected.
    ///
    /// # Recovery
    ///
    /// 1. Read the stream (or [`get_current_version`](crate::EventStore::get_current_version))
    /// 2. Re-apply business logic with the new state
    /// 3. Retry the append with the updated expected version
    #[error("concurrency conflict on stream '{stream}': expected {expected}, but current version is {actual}")]
    ConcurrencyConflict {
        /// The stream where the conflict occurred
        stream: StreamName,
        /// The version the caller expected
        expected: ExpectedVersion,
        /// The version the stream was actually at
        actual: CurrentVersion,
    },

    /// The named stream has never been written to.
    #[error("stream '{stream}' not found")]
    StreamNotFound {
        /// The stream that was looked up
        stream: StreamName,
    },

    /// The request was malformed and rejected before any position was
    /// allocated, e.g. an empty batch or an event with an empty type.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The subscription was stopped or its session went away.
    #[error("subscription closed")]
    SubscriptionClosed,

    // =========================================================================
    // Internal Errors (Investigate and fix)
    // =========================================================================

    /// SQLite operation failed (durable mode only).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Persisted state is corrupt or was written by an incompatible version.
    #[error("schema error: {0}")]
    Schema(String),

    /// Configuration could not be read or failed validation.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the caller can reasonably retry after refreshing state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }

    /// The category reported to clients over the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Error::StreamNotFound { .. } => ErrorKind::StreamNotFound,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::SubscriptionClosed => ErrorKind::SubscriptionClosed,
            Error::Sqlite(_) | Error::Schema(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================
