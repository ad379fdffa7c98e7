#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use streamstore::{CatchUpSubscription, EventStore, NewEvent, RecordedEvent, StoreConfig};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn create_temp_db_path(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

pub fn open_sqlite_store(path: &Path) -> EventStore {
    EventStore::open(StoreConfig::sqlite(path)).expect("open sqlite store")
}

pub fn open_read_only(path: &Path) -> Connection {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .expect("open read-only connection")
}

pub fn open_read_write(path: &Path) -> Connection {
    Connection::open(path).expect("open read-write connection")
}

pub fn event(event_type: &str) -> NewEvent {
    NewEvent::new(event_type, format!("{{\"type\":\"{}\"}}", event_type).into_bytes())
}

pub fn events(types: &[&str]) -> Vec<NewEvent> {
    types.iter().map(|t| event(t)).collect()
}

/// Next event or panic after [`WAIT`].
pub async fn next_event(subscription: &mut CatchUpSubscription) -> RecordedEvent {
    tokio::time::timeout(WAIT, subscription.next())
        .await
        .expect("subscription stalled")
        .expect("subscription ended")
}

/// Asserts nothing arrives within `within`.
pub async fn assert_idle(subscription: &mut CatchUpSubscription, within: Duration) {
    if let Ok(next) = tokio::time::timeout(within, subscription.next()).await {
        panic!("expected no event, got {:?}", next);
    }
}

pub async fn eventually<T>(
    timeout: Duration,
    interval: Duration,
    mut f: impl FnMut() -> Option<T>,
) -> T {
    let start = std::time::Instant::now();
    loop {
        if let Some(v) = f() {
            return v;
        }
        if start.elapsed() > timeout {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(interval).await;
    }
}
