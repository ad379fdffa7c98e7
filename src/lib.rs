//! # StreamStore - Event Sourcing Store
//!
//! StreamStore keeps append-only event streams with optimistic concurrency,
//! orders every commit on one gapless global log, and feeds catch-up
//! subscriptions that can resume from any commit position.
//!
//! - **Streams**: named, append-only, zero-based positions
//! - **Optimistic concurrency**: appends carry an expected version
//! - **Global ordering**: every event gets a gapless commit position
//! - **Catch-up subscriptions**: backlog then live, resumable, never blocking writers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Session / Protocol (per client)                │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          EventStore                             │
//! │       (append_to_stream, read_stream, read_all, subscribe)      │
//! └───────┬─────────────────────┬───────────────────────┬───────────┘
//!         │                     │                       │
//!         ▼                     ▼                       ▼
//! ┌───────────────┐   ┌───────────────────┐   ┌─────────────────────┐
//! │  StreamLog    │──►│ Group commit      │──►│  GlobalLog          │
//! │  (per stream, │   │ + GlobalSequencer │   │  + Subscription     │
//! │  version gate)│   │   (counter)       │   │    fan-out          │
//! └───────────────┘   └─────────┬─────────┘   └─────────────────────┘
//!                               │
//!                               ▼
//!                     ┌───────────────────┐
//!                     │ Journal           │
//!                     │ (memory | SQLite) │
//!                     └───────────────────┘
//! ```
//!
//! ## Core Invariants
//!
//! 1. **Gapless commit order**: commit positions are `1, 2, 3, …` with no gaps or reuse
//! 2. **Stream correctness**: stream positions are `0, 1, 2, …` per stream
//! 3. **Atomic batches**: a batch becomes visible whole or not at all
//! 4. **Failed appends are free**: a conflict or write failure consumes no position
//! 5. **Exact resumption**: a subscription from `p` yields exactly the events after `p`
//!
//! ## Module Organization
//!
//! - [`error`]: Error type for all failure modes
//! - [`types`]: Domain types (StreamName, RecordedEvent, positions, versions)
//! - [`config`]: Store configuration and TOML loading
//! - [`schema`]: SQLite DDL and database initialization
//! - [`journal`]: Persistence seam (memory and SQLite journals)
//! - [`sequencer`]: The global commit-position counter
//! - [`global_log`]: Commit-ordered log of every event
//! - [`stream_log`]: Per-stream logs and readers
//! - [`subscription`]: Catch-up subscriptions and live fan-out
//! - [`api`]: [`EventStore`], the main entry point
//! - [`protocol`] and [`session`]: boundary types and per-client dispatch

// =============================================================================
// Module Declarations
// =============================================================================

/// Error types for StreamStore operations.
pub mod error;

/// Domain types for event sourcing.
///
/// Newtypes for names, ids and positions, plus the records that flow in and
/// out of the store.
pub mod types;

/// Store configuration.
pub mod config;

/// SQLite schema definitions and database initialization.
pub mod schema;

/// Durable (or not) record of committed batches.
///
/// The [`Journal`](journal::Journal) trait is the seam between the in-memory
/// store and its persistence. The group commit calls it one group at a time,
/// so implementations see batches strictly in commit order.
pub mod journal;

/// Global commit-position sequencer.
pub mod sequencer;

/// Group commit: queued appends share one journal write.
mod committer;

/// Store-wide, commit-ordered event log.
pub mod global_log;

/// Per-stream logs with optimistic concurrency.
pub mod stream_log;

/// Catch-up subscriptions.
///
/// Subscribers read backlog from the global log, then switch to live
/// fan-out. Slow subscribers are evicted to catch-up rather than slowing
/// down writers.
pub mod subscription;

/// The main entry point: [`EventStore`](api::EventStore).
pub mod api;

/// Wire-level request and response types.
pub mod protocol;

/// Per-client request dispatch.
pub mod session;

mod sync;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::EventStore;
pub use config::{StorageConfig, StoreConfig};
pub use error::{Error, Result};
pub use protocol::{ErrorKind, Request, Response};
pub use session::Session;
pub use stream_log::StreamReader;
pub use subscription::{CatchUpSubscription, SubscriptionFilter, SubscriptionHandle};
pub use types::{
    CommitPosition, CurrentVersion, Direction, EventId, ExpectedVersion, NewEvent, ReadOptions,
    RecordedEvent, StreamName, StreamPosition, SubscribeFrom,
};
