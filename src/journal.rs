//! # Journals: Where Committed Batches Are Made Durable
//!
//! The group commit hands each group of batches to a [`Journal`] as one
//! `persist` call, before the sequencer's head moves past them. A batch only
//! becomes visible to readers and subscribers after `persist` returned `Ok`,
//! and a failed `persist` leaves no trace in memory: the invariant is that
//! memory never leads disk.
//!
//! - [`MemoryJournal`]: no durability, nothing to do
//! - [`SqliteJournal`]: one SQLite transaction per batch, one row per event

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::schema::Database;
use crate::types::{CommitPosition, EventId, RecordedEvent, StreamName, StreamPosition};

/// Persistence seam of the store.
///
/// Implementations are called by one group leader at a time, so `persist` is
/// ordered exactly like commit positions. No sequencer lock is held.
pub trait Journal: Send {
    /// Durably records a fully positioned batch. All or nothing.
    fn persist(&mut self, batch: &[RecordedEvent]) -> Result<()>;

    /// Returns every previously persisted event in commit order.
    fn recover(&mut self) -> Result<Vec<RecordedEvent>>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

// =============================================================================
// Memory Journal
// =============================================================================

/// Journal of a purely in-memory store.
#[derive(Debug, Default)]
pub struct MemoryJournal;

impl Journal for MemoryJournal {
    fn persist(&mut self, _batch: &[RecordedEvent]) -> Result<()> {
        Ok(())
    }

    fn recover(&mut self) -> Result<Vec<RecordedEvent>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// SQLite Journal
// =============================================================================

/// Append-only SQLite journal keyed by commit position.
#[derive(Debug)]
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn new(db: Database) -> Self {
        Self {
            conn: db.into_connection(),
        }
    }
}

impl Journal for SqliteJournal {
    fn persist(&mut self, batch: &[RecordedEvent]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO events (commit_position, stream_name, stream_position, event_id, event_type, data, metadata, recorded_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for event in batch {
                stmt.execute(params![
                    event.commit_position.as_raw() as i64,
                    event.stream_name.as_str(),
                    event.stream_position.as_raw() as i64,
                    event.id.to_string(),
                    event.event_type,
                    event.data,
                    event.metadata,
                    event.recorded_at_ms as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn recover(&mut self) -> Result<Vec<RecordedEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT commit_position, stream_name, stream_position, event_id, event_type, data, metadata, recorded_ms
             FROM events
             ORDER BY commit_position",
        )?;

        let rows = stmt.query_map([], |row| {
            let commit_position: i64 = row.get(0)?;
            let stream_name: String = row.get(1)?;
            let stream_position: i64 = row.get(2)?;
            let event_id: String = row.get(3)?;
            let event_type: String = row.get(4)?;
            let data: Vec<u8> = row.get(5)?;
            let metadata: Vec<u8> = row.get(6)?;
            let recorded_ms: i64 = row.get(7)?;
            Ok((
                commit_position,
                stream_name,
                stream_position,
                event_id,
                event_type,
                data,
                metadata,
                recorded_ms,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (commit_position, stream_name, stream_position, event_id, event_type, data, metadata, recorded_ms) =
                row?;

            if commit_position <= 0 || stream_position < 0 {
                return Err(Error::Schema(format!(
                    "negative or zero position in row at commit position {}",
                    commit_position
                )));
            }

            let id = Uuid::parse_str(&event_id).map_err(|e| {
                Error::Schema(format!(
                    "invalid event id '{}' at commit position {}: {}",
                    event_id, commit_position, e
                ))
            })?;

            events.push(RecordedEvent {
                id: EventId::from_uuid(id),
                event_type,
                data,
                metadata,
                stream_name: StreamName::new(stream_name),
                stream_position: StreamPosition::from_raw(stream_position as u64),
                commit_position: CommitPosition::from_raw(commit_position as u64),
                recorded_at_ms: recorded_ms.max(0) as u64,
            });
        }

        Ok(events)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(stream: &str, stream_position: u64, commit_position: u64) -> RecordedEvent {
        RecordedEvent {
            id: EventId::new(),
            event_type: "Tested".to_string(),
            data: format!("{}-{}", stream, stream_position).into_bytes(),
            metadata: Vec::new(),
            stream_name: StreamName::new(stream),
            stream_position: StreamPosition::from_raw(stream_position),
            commit_position: CommitPosition::from_raw(commit_position),
            recorded_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_memory_journal_recovers_nothing() {
        let mut journal = MemoryJournal;
        journal.persist(&[recorded("a", 0, 1)]).unwrap();
        assert!(journal.recover().unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_journal_round_trips_in_commit_order() {
        let mut journal = SqliteJournal::new(Database::open_in_memory().unwrap());

        let first = vec![recorded("a", 0, 1), recorded("a", 1, 2)];
        let second = vec![recorded("b", 0, 3)];
        journal.persist(&first).unwrap();
        journal.persist(&second).unwrap();

        let recovered = journal.recover().unwrap();
        assert_eq!(recovered.len(), 3);
        assert_eq!(recovered[0], first[0]);
        assert_eq!(recovered[1], first[1]);
        assert_eq!(recovered[2], second[0]);
    }

    #[test]
    fn test_sqlite_batch_is_all_or_nothing() {
        let mut journal = SqliteJournal::new(Database::open_in_memory().unwrap());
        journal.persist(&[recorded("a", 0, 1)]).unwrap();

        // Second event reuses stream position 0 and violates the unique index.
        let bad = vec![recorded("b", 0, 2), recorded("a", 0, 3)];
        assert!(matches!(journal.persist(&bad), Err(Error::Sqlite(_))));

        let recovered = journal.recover().unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].stream_name.as_str(), "a");
    }

    #[test]
    fn test_sqlite_recover_rejects_corrupt_event_id() {
        let db = Database::open_in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO events (commit_position, stream_name, stream_position, event_id, event_type, data, metadata, recorded_ms)
                 VALUES (1, 'a', 0, 'not-a-uuid', 'T', x'', x'', 0)",
                [],
            )
            .unwrap();

        let mut journal = SqliteJournal::new(db);
        assert!(matches!(journal.recover(), Err(Error::Schema(_))));
    }
}
