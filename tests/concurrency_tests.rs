use std::{
    cell::Cell,
    sync::{Arc, Barrier},
    thread,
};

use relgraph::{
    Direction, GraphConfig, GraphError, GraphStore, JournalConfig, JournalMode, MergeOptions,
    Properties, RetryPolicy, WriteQueue,
};
use serde_json::json;
use tempfile::TempDir;

fn props(value: serde_json::Value) -> Properties {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn test_file_store_uses_wal_and_reconfigures_idempotently() {
    let dir = TempDir::new().expect("tempdir");
    let graph = GraphStore::open(dir.path().join("graph.db")).expect("open");
    assert!(graph.is_file_backed());
    assert_eq!(graph.journal_mode().expect("mode"), "wal");
    let config = JournalConfig::default();
    assert_eq!(graph.configure_journal(&config).expect("first"), "wal");
    assert_eq!(graph.configure_journal(&config).expect("second"), "wal");
}

#[test]
fn test_in_memory_store_reports_memory_journal() {
    let graph = GraphStore::open_in_memory().expect("graph");
    assert!(!graph.is_file_backed());
    let mode = graph.configure_journal(&JournalConfig::default()).expect("configure");
    assert_eq!(mode, "memory");
    assert_eq!(graph.journal_mode().expect("mode"), "memory");
}

#[test]
fn test_journal_cannot_change_inside_transaction() {
    let dir = TempDir::new().expect("tempdir");
    let graph = GraphStore::open(dir.path().join("graph.db")).expect("open");
    graph
        .transaction(|tx| {
            let config = JournalConfig {
                mode: JournalMode::Delete,
                ..JournalConfig::default()
            };
            let err = tx.graph().configure_journal(&config).expect_err("inside tx");
            assert!(matches!(err, GraphError::TransactionState(_)));
            Ok(())
        })
        .expect("transaction");
}

#[test]
fn test_store_retry_uses_configured_policy() {
    let config = GraphConfig {
        retry: RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
        },
        ..GraphConfig::default()
    };
    let graph = GraphStore::open_in_memory_with_config(&config).expect("graph");
    let calls = Cell::new(0);
    let value = graph
        .with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(GraphError::busy("database is locked"))
            } else {
                Ok(calls.get())
            }
        })
        .expect("eventually succeeds");
    assert_eq!(value, 3);
    assert_eq!(graph.metrics_snapshot().busy_retries, 2);

    let exhausted: Result<(), GraphError> = graph.with_retry(|| Err(GraphError::busy("still locked")));
    match exhausted {
        Err(GraphError::RetryExhausted {
            attempts,
            last_message,
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last_message, "still locked");
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

#[test]
fn test_queued_merges_from_two_connections_create_once() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("graph.db");
    // Create the schema before the writers race.
    GraphStore::open(&path).expect("init");

    let queue = Arc::new(WriteQueue::new());
    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let graph = GraphStore::open(&path).expect("open");
                barrier.wait();
                queue.submit(|| {
                    graph.with_retry(|| {
                        graph.merge_node(
                            "Company",
                            &props(json!({"name": "Acme"})),
                            None,
                            &MergeOptions::new(),
                        )
                    })
                })
            })
        })
        .collect();

    let outcomes: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().expect("join").expect("merge"))
        .collect();
    assert_eq!(outcomes.iter().filter(|o| o.created).count(), 1);
    assert_eq!(outcomes[0].value.id, outcomes[1].value.id);

    let reader = GraphStore::open(&path).expect("reader");
    assert_eq!(reader.nodes("Company").count().expect("count"), 1);
    assert_eq!(queue.depth(), 0);
    assert!(!queue.is_processing());
}

#[test]
fn test_reader_sees_committed_writes_from_another_connection() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("graph.db");
    let writer = GraphStore::open(&path).expect("writer");
    let reader = GraphStore::open(&path).expect("reader");
    let node = writer
        .create_node("Item", props(json!({"n": 1})))
        .expect("create");
    let seen = reader.get_node(node.id).expect("read").expect("visible");
    assert_eq!(seen.properties, node.properties);
}

#[test]
fn test_cached_adjacency_sees_edges_committed_elsewhere() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("graph.db");
    let writer = GraphStore::open(&path).expect("writer");
    let reader = GraphStore::open(&path).expect("reader");
    let a = writer.create_node("Person", Properties::new()).expect("a");
    let b = writer.create_node("Person", Properties::new()).expect("b");

    let before = reader.traverse(a.id).out("KNOWS").ids().expect("before");
    assert!(before.is_empty());

    let edge = writer.create_edge(a.id, "KNOWS", b.id, None).expect("edge");
    let after = reader.traverse(a.id).out("KNOWS").ids().expect("after");
    assert_eq!(after, vec![b.id]);
    assert_eq!(
        reader
            .neighbors(b.id, Some("KNOWS"), Direction::In, None)
            .expect("neighbors"),
        vec![a.id]
    );

    assert!(writer.delete_edge(edge.id).expect("delete"));
    let gone = reader.traverse(a.id).out("KNOWS").ids().expect("gone");
    assert!(gone.is_empty());
}
