//! Chaos testing for concurrent access.
//!
//! Tests concurrent operations to find races and deadlocks:
//! - Concurrent saves to one record never corrupt the chain
//! - Concurrent saves to distinct records proceed independently
//! - Mixed save, read and rename workloads
//! - Concurrent async saves from many tasks

// Chaos tests use expect/unwrap/panic for simplicity - panics are acceptable in tests
// Excessive nesting is acceptable in concurrent test code with thread spawns
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::excessive_nesting
)]

use serde::{Deserialize, Serialize};
use slotstore::{JsonSerializer, Repository, RepositorySettings};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    writer: usize,
    seq: usize,
    payload: String,
}

fn entry(writer: usize, seq: usize) -> Arc<Entry> {
    Arc::new(Entry {
        writer,
        seq,
        payload: "x".repeat(64 * (writer + 1)),
    })
}

fn repo(dir: &Path) -> Arc<Repository<JsonSerializer>> {
    let settings = RepositorySettings::new(dir).with_default_backups();
    Arc::new(Repository::new(settings, JsonSerializer).unwrap())
}

fn parse(path: &Path) -> Entry {
    serde_json::from_slice(&fs::read(path).unwrap())
        .unwrap_or_else(|e| panic!("{} is corrupt: {e}", path.display()))
}

// ============================================================================
// Threads
// ============================================================================

/// Test: concurrent saves to one record leave every slot parseable.
#[test]
fn test_concurrent_saves_same_record() {
    let dir = TempDir::new().unwrap();
    let repo = repo(dir.path());
    let num_threads = 8;
    let saves_per_thread = 25;

    let handles: Vec<_> = (0..num_threads)
        .map(|writer| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for seq in 0..saves_per_thread {
                    repo.save(&entry(writer, seq), "shared").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked");
    }

    let paths = repo.paths("shared").unwrap();
    let primary = parse(paths.primary());
    parse(paths.backup());
    parse(paths.soft_delete_backup());
    assert!(!paths.temp().exists());

    // The cache holds whatever was saved last, which is on disk.
    let cached = repo.read::<Entry>("shared").unwrap();
    assert_eq!(*cached, primary);
    assert!(!repo.is_dirty(&*cached, "shared").unwrap());
}

/// Test: concurrent saves to distinct records do not interfere.
#[test]
fn test_concurrent_saves_distinct_records() {
    let dir = TempDir::new().unwrap();
    let repo = repo(dir.path());
    let num_threads = 8;
    let saves_per_thread = 20;

    let handles: Vec<_> = (0..num_threads)
        .map(|writer| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                let name = format!("record-{writer}");
                for seq in 0..saves_per_thread {
                    repo.save(&entry(writer, seq), &name).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked");
    }

    for writer in 0..num_threads {
        let paths = repo.paths(&format!("record-{writer}")).unwrap();
        assert_eq!(parse(paths.primary()).seq, saves_per_thread - 1);
        assert_eq!(parse(paths.backup()).seq, saves_per_thread - 2);
        assert_eq!(parse(paths.soft_delete_backup()).seq, saves_per_thread - 3);
    }
}

/// Test: readers racing writers always see a complete object.
#[test]
fn test_concurrent_reads_during_saves() {
    let dir = TempDir::new().unwrap();
    // Uncached, so every read goes to disk.
    let settings = RepositorySettings::new(dir.path())
        .with_default_backups()
        .with_caching(false);
    let repo = Arc::new(Repository::new(settings, JsonSerializer).unwrap());
    repo.save(&entry(0, 0), "hot").unwrap();
    let reads = Arc::new(AtomicUsize::new(0));

    let writer = {
        let repo = Arc::clone(&repo);
        thread::spawn(move || {
            for seq in 1..100 {
                repo.save(&entry(0, seq), "hot").unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                for _ in 0..50 {
                    let item = repo.read::<Entry>("hot").unwrap();
                    assert_eq!(item.writer, 0);
                    reads.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    writer.join().expect("writer panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }

    assert_eq!(reads.load(Ordering::SeqCst), 200);
}

/// Test: opposite renames between two names never deadlock.
#[test]
fn test_concurrent_renames_no_deadlock() {
    let dir = TempDir::new().unwrap();
    let repo = repo(dir.path());
    repo.save(&entry(0, 0), "left").unwrap();

    let handles: Vec<_> = [("left", "right"), ("right", "left")]
        .into_iter()
        .map(|(from, to)| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for _ in 0..50 {
                    // Either direction may find nothing to move.
                    let _ = repo.rename(from, to, false);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("renamer panicked");
    }

    let left = repo.exists("left").unwrap();
    let right = repo.exists("right").unwrap();
    assert!(left ^ right);
}

// ============================================================================
// Async
// ============================================================================

/// Test: many tasks saving the same record serialize correctly.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_saves() {
    let dir = TempDir::new().unwrap();
    let repo = repo(dir.path());

    let tasks: Vec<_> = (0..16)
        .map(|writer| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                for seq in 0..10 {
                    repo.save_async(&entry(writer, seq), "async").await.unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task panicked");
    }

    let paths = repo.paths("async").unwrap();
    let primary = parse(paths.primary());
    parse(paths.backup());
    parse(paths.soft_delete_backup());
    assert!(!paths.temp().exists());

    let cached = repo.read_async::<Entry>("async").await.unwrap();
    assert_eq!(*cached, primary);
}

/// Test: async saves to distinct records run side by side.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_distinct_records() {
    let dir = TempDir::new().unwrap();
    let repo = repo(dir.path());

    let tasks: Vec<_> = (0..8)
        .map(|writer| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                let name = format!("task-{writer}");
                for seq in 0..5 {
                    repo.save_async(&entry(writer, seq), &name).await.unwrap();
                }
                repo.read_async::<Entry>(&name).await.unwrap()
            })
        })
        .collect();

    for (writer, task) in tasks.into_iter().enumerate() {
        let last = task.await.expect("task panicked");
        assert_eq!(last.writer, writer);
        assert_eq!(last.seq, 4);
    }
}
