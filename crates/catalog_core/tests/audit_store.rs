use catalog_core::{
    AuditLogRecord, AuditLogStore, AuditStoreError, JsonlAuditLogStore, MutationKind,
    RequestContext,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn sample_record(path: &str) -> AuditLogRecord {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
    AuditLogRecord::for_mutation(
        &RequestContext::new("192.168.1.20", path),
        MutationKind::Create,
        &at,
    )
}

fn read_documents(store: &JsonlAuditLogStore) -> Vec<Value> {
    std::fs::read_to_string(store.path())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn append_writes_one_document_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlAuditLogStore::open(dir.path().join("logs.jsonl")).unwrap();

    let id = store.append(&sample_record("/items")).unwrap();

    let documents = read_documents(&store);
    assert_eq!(documents.len(), 1);
    let doc = &documents[0];
    assert_eq!(doc["_id"], id.to_string());
    assert_eq!(doc["clientIP"], "192.168.1.20");
    assert_eq!(doc["method"], "POST");
    assert_eq!(doc["path"], "/items");
    assert_eq!(doc["statusCode"], 201);
    assert_eq!(doc["timeStamp"], "01-03-2024 14:30:00");
}

#[test]
fn append_assigns_distinct_ids_and_keeps_earlier_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlAuditLogStore::open(dir.path().join("logs.jsonl")).unwrap();

    let first = store.append(&sample_record("/items")).unwrap();
    let second = store.append(&sample_record("/items/1")).unwrap();
    assert_ne!(first, second);

    let documents = read_documents(&store);
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["path"], "/items");
    assert_eq!(documents[1]["path"], "/items/1");
}

#[test]
fn reopening_appends_to_existing_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.jsonl");

    JsonlAuditLogStore::open(&path)
        .unwrap()
        .append(&sample_record("/items"))
        .unwrap();
    let reopened = JsonlAuditLogStore::open(&path).unwrap();
    reopened.append(&sample_record("/items/1")).unwrap();

    assert_eq!(read_documents(&reopened).len(), 2);
}

#[test]
fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit").join("nested").join("logs.jsonl");

    let store = JsonlAuditLogStore::open(&path).unwrap();
    store.append(&sample_record("/items")).unwrap();

    assert!(path.exists());
}

#[test]
fn open_fails_when_path_is_a_directory() {
    let dir = tempfile::tempdir().unwrap();

    let err = JsonlAuditLogStore::open(dir.path()).err().unwrap();
    assert!(matches!(err, AuditStoreError::Io { .. }));
}

#[test]
fn concurrent_appends_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonlAuditLogStore::open(dir.path().join("logs.jsonl")).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..10)
                    .map(|index| {
                        store
                            .append(&sample_record(&format!("/items/{worker}-{index}")))
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let ids: HashSet<_> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    let documents = read_documents(&store);
    assert_eq!(ids.len(), 80);
    assert_eq!(documents.len(), 80);
    assert!(documents.iter().all(|doc| doc["method"] == "POST"));
}

#[test]
fn timed_out_appends_only_land_when_reported_committed() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlAuditLogStore::open(dir.path().join("logs.jsonl"))
        .unwrap()
        .with_deadline(Duration::from_nanos(1));

    let mut appended = 0;
    let mut in_flight = 0;
    let mut dropped = 0;
    for _ in 0..20 {
        match store.append(&sample_record("/items")) {
            Ok(_) => appended += 1,
            Err(AuditStoreError::Timeout {
                committed: true, ..
            }) => in_flight += 1,
            Err(AuditStoreError::Timeout {
                committed: false, ..
            }) => dropped += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    thread::sleep(Duration::from_millis(500));

    assert_eq!(appended + in_flight + dropped, 20);
    assert!(appended < 20);
    assert_eq!(read_documents(&store).len(), appended + in_flight);
}
