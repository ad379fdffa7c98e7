//! StreamStore Stress Test Binary
//!
//! A standalone binary for stress testing StreamStore under high concurrency.
//! Run with: `cargo run --bin stress_test -- [OPTIONS]`
//!
//! Writers append concurrently while one catch-up subscription, started
//! before the first write, verifies that it sees every event exactly once in
//! gapless commit order with gapless stream positions.
//!
//! # Examples
//!
//! ```bash
//! # Default test: 100 streams, 10000 events, 10 concurrent tasks, in memory
//! cargo run --release --bin stress_test
//!
//! # Same-stream contention with optimistic retries
//! cargo run --release --bin stress_test -- --same-stream --events 2000 --concurrency 20
//!
//! # Durable mode, then reopen and check recovery
//! RUST_LOG=streamstore=debug cargo run --release --bin stress_test -- --db /tmp/stress.db
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use streamstore::{
    CommitPosition, CurrentVersion, EventStore, ExpectedVersion, NewEvent, StoreConfig,
    StreamName, StreamPosition, SubscribeFrom,
};

/// Stress test configuration
struct Config {
    /// Number of unique streams to write to
    num_streams: usize,
    /// Total number of events to write
    num_events: usize,
    /// Events per append
    batch_size: usize,
    /// Number of concurrent writer tasks
    concurrency: usize,
    /// Whether to test same-stream contention
    same_stream: bool,
    /// Subscriber queue capacity (small values force catch-up fallbacks)
    queue_capacity: Option<usize>,
    /// SQLite database path (in memory if None)
    db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_streams: 100,
            num_events: 10_000,
            batch_size: 1,
            concurrency: 10,
            same_stream: false,
            queue_capacity: None,
            db_path: None,
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i).and_then(|value| value.parse().ok()) {
        Some(value) => value,
        None => {
            eprintln!("Invalid or missing value for {}", flag);
            std::process::exit(1);
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--streams" | "-s" => {
                i += 1;
                config.num_streams = parse_value(&args, i, flag);
            }
            "--events" | "-e" => {
                i += 1;
                config.num_events = parse_value(&args, i, flag);
            }
            "--batch" | "-b" => {
                i += 1;
                config.batch_size = parse_value(&args, i, flag);
            }
            "--concurrency" | "-c" => {
                i += 1;
                config.concurrency = parse_value(&args, i, flag);
            }
            "--queue" | "-q" => {
                i += 1;
                config.queue_capacity = Some(parse_value(&args, i, flag));
            }
            "--same-stream" => {
                config.same_stream = true;
            }
            "--db" | "-d" => {
                i += 1;
                config.db_path = Some(parse_value(&args, i, flag));
            }
            "--help" | "-h" => {
                println!(
                    r#"StreamStore Stress Test

Usage: stress_test [OPTIONS]

Options:
  -s, --streams <N>     Number of unique streams (default: 100)
  -e, --events <N>      Total events to write (default: 10000)
  -b, --batch <N>       Events per append (default: 1)
  -c, --concurrency <N> Concurrent writer tasks (default: 10)
  -q, --queue <N>       Subscriber queue capacity (default: from config)
  --same-stream         Test same-stream contention with retries
  -d, --db <PATH>       SQLite database path (default: in memory)
  -h, --help            Show this help
"#
                );
                std::process::exit(0);
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    if config.concurrency == 0 || config.batch_size == 0 || config.num_streams == 0 {
        eprintln!("--concurrency, --batch and --streams must be positive");
        std::process::exit(1);
    }
    config
}

fn expected_for(current: CurrentVersion) -> ExpectedVersion {
    match current {
        CurrentVersion::NoStream => ExpectedVersion::NoStream,
        CurrentVersion::At(position) => ExpectedVersion::Exact(position),
    }
}

/// Consumes the subscription until `total` events arrived, checking order.
async fn verify(
    store: EventStore,
    total: u64,
) -> Result<HashMap<StreamName, u64>, String> {
    let mut subscription = store.subscribe_to_all(SubscribeFrom::Start);
    let mut last = CommitPosition::START;
    let mut next_position: HashMap<StreamName, u64> = HashMap::new();

    while last.as_raw() < total {
        let event = subscription
            .next()
            .await
            .ok_or_else(|| "subscription ended early".to_string())?;

        if event.commit_position != last.next() {
            return Err(format!(
                "commit order broken: expected {}, got {}",
                last.next(),
                event.commit_position
            ));
        }
        last = event.commit_position;

        let expected = next_position.entry(event.stream_name.clone()).or_insert(0);
        if event.stream_position != StreamPosition::from_raw(*expected) {
            return Err(format!(
                "stream '{}' position gap: expected {}, got {}",
                event.stream_name, expected, event.stream_position
            ));
        }
        *expected += 1;
    }
    Ok(next_position)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = parse_args();

    println!("StreamStore Stress Test");
    println!("=======================");
    println!("Streams:     {}", config.num_streams);
    println!("Events:      {}", config.num_events);
    println!("Batch:       {}", config.batch_size);
    println!("Concurrency: {}", config.concurrency);
    println!(
        "Mode:        {}",
        if config.same_stream {
            "Same-stream contention"
        } else {
            "Multi-stream"
        }
    );
    println!();

    let mut store_config = match &config.db_path {
        Some(path) => StoreConfig::sqlite(path),
        None => StoreConfig::in_memory(),
    };
    if let Some(capacity) = config.queue_capacity {
        store_config = store_config.with_subscriber_queue_capacity(capacity);
    }
    let store = EventStore::open(store_config.clone())?;
    let base = store.head_position().as_raw();
    if base > 0 {
        eprintln!("Database already holds {} events; use a fresh path", base);
        std::process::exit(1);
    }

    // Metrics
    let appends = Arc::new(AtomicU64::new(0));
    let conflicts = Arc::new(AtomicU64::new(0));
    let errors = Arc::new(AtomicU64::new(0));

    let appends_per_task = config.num_events / (config.concurrency * config.batch_size);
    let total = (appends_per_task * config.concurrency * config.batch_size) as u64;

    let verifier = tokio::spawn(verify(store.clone(), total));

    println!("Starting stress test...");
    let start = Instant::now();

    let mut handles = Vec::new();
    for task_id in 0..config.concurrency {
        let store = store.clone();
        let appends = appends.clone();
        let conflicts = conflicts.clone();
        let errors = errors.clone();
        let num_streams = config.num_streams;
        let batch_size = config.batch_size;
        let same_stream = config.same_stream;

        handles.push(tokio::spawn(async move {
            for i in 0..appends_per_task {
                let stream = if same_stream {
                    StreamName::new("stress-stream")
                } else {
                    let n = rand::thread_rng().gen_range(0..num_streams);
                    StreamName::new(format!("stream-{}", n))
                };

                loop {
                    let batch: Vec<NewEvent> = (0..batch_size)
                        .map(|j| {
                            NewEvent::new(
                                "StressEvent",
                                format!("stress-event-{}-{}-{}", task_id, i, j).into_bytes(),
                            )
                        })
                        .collect();

                    let expected = if same_stream {
                        expected_for(store.get_current_version(&stream))
                    } else {
                        ExpectedVersion::Any
                    };

                    match store.append_to_stream(&stream, expected, batch) {
                        Ok(_) => {
                            appends.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                        Err(e) if e.is_conflict() => {
                            conflicts.fetch_add(1, Ordering::Relaxed);
                            tokio::task::yield_now().await;
                        }
                        Err(e) => {
                            error!(error = %e, "append failed");
                            errors.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }
    let elapsed = start.elapsed();

    let append_count = appends.load(Ordering::Relaxed);
    let conflict_count = conflicts.load(Ordering::Relaxed);
    let error_count = errors.load(Ordering::Relaxed);
    let written = append_count * config.batch_size as u64;

    println!();
    println!("Results");
    println!("-------");
    println!("Appends:         {}", append_count);
    println!("Events written:  {}", written);
    println!("Conflicts:       {}", conflict_count);
    println!("Errors:          {}", error_count);
    println!("Duration:        {:?}", elapsed);
    println!(
        "Throughput:      {:.2} events/sec",
        written as f64 / elapsed.as_secs_f64()
    );
    println!();

    if error_count > 0 {
        verifier.abort();
        return Err(format!("{} appends failed", error_count).into());
    }

    println!("Verifying invariants...");
    assert_eq!(store.head_position().as_raw(), total, "head position mismatch");
    println!("  Head position:     {} ✓", total);

    let per_stream = tokio::time::timeout(Duration::from_secs(60), verifier)
        .await
        .map_err(|_| "verifier timed out")??
        .map_err(|e| format!("verification failed: {}", e))?;
    println!("  Commit positions:  gapless, no duplicates ✓");
    println!(
        "  Stream positions:  gapless across {} streams ✓",
        per_stream.len()
    );

    for (stream, count) in &per_stream {
        let expected = CurrentVersion::At(StreamPosition::from_raw(count - 1));
        assert_eq!(store.get_current_version(stream), expected, "version of {}", stream);
    }
    println!("  Current versions:  consistent ✓");

    if config.db_path.is_some() {
        drop(store);
        let reopened = EventStore::open(store_config)?;
        assert_eq!(reopened.head_position().as_raw(), total, "recovered head mismatch");
        info!(head = total, "reopened store");
        println!("  Recovery:          {} events restored ✓", total);
    }

    println!();
    println!("Stress test PASSED ✓");
    Ok(())
}
