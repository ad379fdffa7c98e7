//! # SQLite Schema for StreamStore
//!
//! Durable mode keeps one append-only row per recorded event.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  events                                                      │
//! │  ┌──────────────────────────┐                                │
//! │  │ commit_position (PK)     │ ◄── sequential scan on open    │
//! │  │ stream_name              │ ─┐                             │
//! │  │ stream_position          │ ─┴─ UNIQUE (stream reads)      │
//! │  │ event_id, event_type     │                                │
//! │  │ data, metadata (BLOB)    │                                │
//! │  │ recorded_ms              │                                │
//! │  └──────────────────────────┘                                │
//! │                                                              │
//! │  streamstore_metadata (key, value)  ── schema_version        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recording the same stream position twice violates the
//! `(stream_name, stream_position)` unique index and fails the whole batch's
//! transaction.

use rusqlite::{params, Connection, OptionalExtension};

use crate::{Error, Result};

// =============================================================================
// Schema Version
// =============================================================================

const SCHEMA_VERSION: i32 = 1;

// =============================================================================
// DDL Statements
// =============================================================================

const CREATE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    commit_position INTEGER PRIMARY KEY,
    stream_name     TEXT NOT NULL,
    stream_position INTEGER NOT NULL,
    event_id        TEXT NOT NULL,
    event_type      TEXT NOT NULL,
    data            BLOB NOT NULL,
    metadata        BLOB NOT NULL,
    recorded_ms     INTEGER NOT NULL
)
"#;

const CREATE_EVENTS_STREAM_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS events_stream_position
ON events(stream_name, stream_position)
"#;

const CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS streamstore_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

// =============================================================================
// Database Wrapper
// =============================================================================

/// An initialized SQLite database, ready to be handed to a journal.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mut db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&mut self) -> Result<()> {
        // WAL keeps readers off the writer's back; NORMAL syncs the WAL on
        // commit but not on every page write.
        self.conn.execute_batch("PRAGMA journal_mode = WAL")?;
        self.conn.execute_batch("PRAGMA synchronous = NORMAL")?;

        self.conn.execute_batch(CREATE_METADATA)?;
        self.conn.execute_batch(CREATE_EVENTS)?;
        self.conn.execute_batch(CREATE_EVENTS_STREAM_INDEX)?;

        self.check_schema_version()
    }

    fn check_schema_version(&mut self) -> Result<()> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM streamstore_metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            None => {
                self.conn.execute(
                    "INSERT INTO streamstore_metadata (key, value) VALUES ('schema_version', ?)",
                    params![SCHEMA_VERSION.to_string()],
                )?;
                Ok(())
            }
            Some(value) => {
                let version: i32 = value
                    .parse()
                    .map_err(|_| Error::Schema(format!("unreadable schema version '{}'", value)))?;
                if version != SCHEMA_VERSION {
                    return Err(Error::Schema(format!(
                        "database schema version {} is not supported (expected {})",
                        version, SCHEMA_VERSION
                    )));
                }
                Ok(())
            }
        }
    }

    #[cfg(test)]
    fn schema_version(&self) -> Result<i32> {
        let value: String = self.conn.query_row(
            "SELECT value FROM streamstore_metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        value
            .parse()
            .map_err(|_| Error::Schema(format!("unreadable schema version '{}'", value)))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

// =============================================================================
// Tests
// =============================================================================
