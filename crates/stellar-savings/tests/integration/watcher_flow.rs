//! Integration Tests: Contract Event Watcher
//!
//! - Start ledger from the stored cursor and the lookback window
//! - Polling, merging and cursor persistence
//! - Paging past a full ledger and across quiet ledgers
//! - JSON cursor file
//! - Background task lifetime

use super::mocks::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use stellar_savings::gateway::{ContractGateway, EventStart};
use stellar_savings::{CursorStore, EventWatcher, JsonFileCursorStore, MemoryCursorStore};
use tempfile::TempDir;

fn watcher(contracts: &Arc<MockContracts>, store: Arc<dyn CursorStore>) -> EventWatcher {
    EventWatcher::new(
        Arc::clone(contracts) as Arc<dyn ContractGateway>,
        store,
        SAVINGS,
    )
    .lookback(5000)
    .limit(15)
    .interval(Duration::from_millis(10))
}

fn memory_store(cursor: Option<u32>) -> Arc<dyn CursorStore> {
    let store = MemoryCursorStore::new();
    if let Some(cursor) = cursor {
        store.save(SAVINGS, cursor).unwrap();
    }
    Arc::new(store)
}

#[tokio::test]
async fn test_start_ledger_without_cursor() {
    let contracts = Arc::new(MockContracts::new());

    contracts.set_latest_ledger(Some(10_000));
    assert_eq!(watcher(&contracts, memory_store(None)).start_ledger().await, 5_000);

    contracts.set_latest_ledger(Some(3_000));
    assert_eq!(watcher(&contracts, memory_store(None)).start_ledger().await, 1);

    contracts.set_latest_ledger(None);
    assert_eq!(watcher(&contracts, memory_store(None)).start_ledger().await, 1);
}

#[tokio::test]
async fn test_start_ledger_clamps_stored_cursor() {
    let contracts = Arc::new(MockContracts::new());
    contracts.set_latest_ledger(Some(10_000));

    let cases = [(9_000, 9_000), (100, 5_000), (20_000, 10_000)];
    for (stored, expected) in cases {
        let start = watcher(&contracts, memory_store(Some(stored))).start_ledger().await;
        assert_eq!(start, expected, "stored cursor {}", stored);
    }

    contracts.set_latest_ledger(None);
    let start = watcher(&contracts, memory_store(Some(777))).start_ledger().await;
    assert_eq!(start, 777);
}

#[tokio::test]
async fn test_poll_advances_and_persists_cursor() {
    let contracts = Arc::new(MockContracts::new());
    contracts.set_latest_ledger(Some(10_000));
    contracts.push_events([
        event("old", 4_000, "save", 1),
        event("a", 5_100, "goal", 500),
        event("b", 5_200, "save", 25),
    ]);
    let store = memory_store(None);
    let mut watcher = watcher(&contracts, Arc::clone(&store));

    let events = watcher.poll_once().await.unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(store.load(SAVINGS).unwrap(), Some(5_200));
    assert_eq!(events[0].name().as_deref(), Some("save"));
    assert_eq!(events[0].amount(), Some(25));

    contracts.push_events([event("c", 5_300, "save", 10)]);
    let events = watcher.poll_once().await.unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
    assert_eq!(watcher.cursor(), Some(5_300));
    assert_eq!(
        contracts.event_starts(),
        vec![EventStart::Ledger(5_000), EventStart::After("b".into())]
    );
}

#[tokio::test]
async fn test_full_ledger_does_not_stall_polling() {
    let contracts = Arc::new(MockContracts::new());
    contracts.set_latest_ledger(Some(10_000));
    contracts.push_events((0..16).map(|i| event(&format!("e{:02}", i), 5_100, "save", i)));
    contracts.push_events([event("later", 5_200, "goal", 900)]);
    let store = memory_store(None);
    let mut watcher = watcher(&contracts, Arc::clone(&store));

    let first = watcher.poll_once().await.unwrap();
    assert_eq!(first.len(), 15);
    assert_eq!(watcher.cursor(), Some(5_100));

    let second = watcher.poll_once().await.unwrap();
    assert_eq!(second[0].id, "later");
    assert_eq!(second[1].id, "e15");
    assert_eq!(second.len(), 15);
    assert_eq!(watcher.cursor(), Some(5_200));
    assert_eq!(store.load(SAVINGS).unwrap(), Some(5_200));
    assert_eq!(
        contracts.event_starts(),
        vec![EventStart::Ledger(5_000), EventStart::After("e14".into())]
    );
}

#[tokio::test]
async fn test_quiet_polls_follow_latest_ledger() {
    let contracts = Arc::new(MockContracts::new());
    contracts.set_latest_ledger(Some(10_000));
    let store = memory_store(None);
    let mut live = watcher(&contracts, Arc::clone(&store));

    assert!(live.poll_once().await.unwrap().is_empty());
    assert_eq!(live.cursor(), Some(10_000));

    contracts.set_latest_ledger(Some(200_000));
    assert!(live.poll_once().await.unwrap().is_empty());
    assert_eq!(live.cursor(), Some(200_000));
    assert_eq!(store.load(SAVINGS).unwrap(), Some(200_000));

    contracts.set_latest_ledger(Some(200_500));
    contracts.push_events([event("fresh", 200_100, "save", 7)]);
    let events = live.poll_once().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "fresh");

    assert_eq!(
        contracts.event_starts(),
        vec![
            EventStart::Ledger(5_000),
            EventStart::Ledger(10_000),
            EventStart::Ledger(200_000),
        ]
    );

    // a restarted watcher resumes inside the lookback window
    let restarted = watcher(&contracts, store);
    assert_eq!(restarted.start_ledger().await, 200_100);
}

#[test]
fn test_json_cursor_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("state").join("cursors.json");

    let store = JsonFileCursorStore::new(&path);
    assert_eq!(store.load(SAVINGS).unwrap(), None);

    store.save(SAVINGS, 123_456).unwrap();
    store.save("COTHER", 42).unwrap();

    let reopened = JsonFileCursorStore::new(&path);
    assert_eq!(reopened.load(SAVINGS).unwrap(), Some(123_456));
    assert_eq!(reopened.load("COTHER").unwrap(), Some(42));

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed[SAVINGS], 123_456);
}

#[test]
fn test_corrupt_cursor_file_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("cursors.json");
    std::fs::write(&path, "not json").unwrap();

    let store = JsonFileCursorStore::new(&path);
    assert!(store.load(SAVINGS).is_err());
}

#[tokio::test]
async fn test_resume_from_file_cursor() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("cursors.json");
    let contracts = Arc::new(MockContracts::new());
    contracts.set_latest_ledger(Some(10_000));
    contracts.push_events([event("a", 9_500, "save", 3)]);

    let mut first = watcher(&contracts, Arc::new(JsonFileCursorStore::new(&path)));
    first.poll_once().await.unwrap();

    let second = watcher(&contracts, Arc::new(JsonFileCursorStore::new(&path)));
    assert_eq!(second.start_ledger().await, 9_500);
}

#[tokio::test]
async fn test_spawned_watcher_publishes_and_stops() {
    let contracts = Arc::new(MockContracts::new());
    contracts.set_latest_ledger(Some(10_000));
    contracts.push_events([event("a", 9_000, "save", 5)]);

    let handle = watcher(&contracts, memory_store(None)).spawn();
    let mut updates = handle.subscribe();

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("watcher never published")
        .unwrap();
    assert_eq!(handle.events().len(), 1);
    assert!(handle.is_running());

    handle.stop().await;
    let polls = contracts.event_starts().len();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(contracts.event_starts().len(), polls);
}

#[tokio::test]
async fn test_dropping_handle_stops_polling() {
    let contracts = Arc::new(MockContracts::new());
    contracts.set_latest_ledger(Some(10_000));

    let handle = watcher(&contracts, memory_store(None)).spawn();
    tokio::time::sleep(Duration::from_millis(30)).await;
    drop(handle);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let polls = contracts.event_starts().len();
    assert!(polls >= 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(contracts.event_starts().len(), polls);
}
