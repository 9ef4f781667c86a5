use catalog_core::db::migrations::{apply_migrations, latest_version};
use catalog_core::db::{open_db, open_db_in_memory};
use catalog_core::{ItemPayload, ItemStore, PageRequest, SqliteItemStore, StoreError};
use rusqlite::Connection;
use std::time::Duration;

#[test]
fn create_and_find_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();

    let payload = ItemPayload::named("Lager")
        .with_category("beer")
        .with_description("crisp and pale")
        .with_image("/file/lager.png");
    let created = store.create(&payload).unwrap();

    assert!(created.id > 0);
    assert!(created.created_at > 0);
    assert_eq!(created.created_at, created.updated_at);
    assert!(created.is_active());

    let loaded = store.find(created.id).unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.payload(), payload);
}

#[test]
fn create_rejects_invalid_payload() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();

    let err = store.create(&ItemPayload::named("")).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let (items, total) = store.find_all("", PageRequest::default()).unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 0);
}

#[test]
fn find_missing_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();

    let err = store.find(42).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(42)));
}

#[test]
fn update_replaces_mutable_fields_only() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();

    let created = store
        .create(&ItemPayload::named("Lager").with_category("beer"))
        .unwrap();

    let mut changed = created.clone();
    changed.apply(&ItemPayload::named("Lager Strong").with_image("/file/strong.png"));
    changed.created_at = 1;
    let updated = store.update(&changed).unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "Lager Strong");
    assert_eq!(updated.category, None);
    assert_eq!(updated.image.as_deref(), Some("/file/strong.png"));
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
}

#[test]
fn update_missing_or_deleted_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();

    let created = store.create(&ItemPayload::named("Stout")).unwrap();
    store.delete(created.id).unwrap();

    let err = store.update(&created).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == created.id));

    let mut ghost = created.clone();
    ghost.id = 999;
    let err = store.update(&ghost).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(999)));
}

#[test]
fn soft_delete_hides_item_and_keeps_row() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();

    let created = store.create(&ItemPayload::named("Porter")).unwrap();
    store.delete(created.id).unwrap();

    assert!(matches!(
        store.find(created.id).unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        store.delete(created.id).unwrap_err(),
        StoreError::NotFound(_)
    ));

    let deleted_at: Option<i64> = conn
        .query_row(
            "SELECT deleted_at FROM items WHERE id = ?1;",
            [created.id],
            |row| row.get(0),
        )
        .unwrap();
    assert!(deleted_at.is_some());

    let next = store.create(&ItemPayload::named("Porter")).unwrap();
    assert!(next.id > created.id);
}

#[test]
fn prefix_search_counts_with_the_same_filter() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();
    for name in ["Lager", "Lime Ale", "Stout"] {
        store.create(&ItemPayload::named(name)).unwrap();
    }

    let (items, total) = store.find_all("L", PageRequest::new(10, 0)).unwrap();
    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();

    assert_eq!(names, ["Lager", "Lime Ale"]);
    assert_eq!(total, 2);
}

#[test]
fn prefix_search_ignores_ascii_case() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();
    for name in ["Lager", "lime ale", "Stout"] {
        store.create(&ItemPayload::named(name)).unwrap();
    }

    let (items, total) = store.find_all("L", PageRequest::default()).unwrap();
    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, ["Lager", "lime ale"]);
    assert_eq!(total, 2);

    let (items, total) = store.find_all("sTo", PageRequest::default()).unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].name, "Stout");
}

#[test]
fn search_excludes_deleted_items_from_page_and_total() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();
    let lager = store.create(&ItemPayload::named("Lager")).unwrap();
    store.create(&ItemPayload::named("Lime Ale")).unwrap();
    store.delete(lager.id).unwrap();

    let (items, total) = store.find_all("L", PageRequest::default()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Lime Ale");
    assert_eq!(total, 1);
}

#[test]
fn search_treats_wildcards_literally() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();
    store.create(&ItemPayload::named("100% Malt")).unwrap();
    store.create(&ItemPayload::named("1000 Hops")).unwrap();
    store.create(&ItemPayload::named("Dark_Ale")).unwrap();
    store.create(&ItemPayload::named("DarkXAle")).unwrap();

    let (items, total) = store.find_all("100%", PageRequest::default()).unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].name, "100% Malt");

    let (items, total) = store.find_all("Dark_", PageRequest::default()).unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].name, "Dark_Ale");
}

#[test]
fn pagination_slices_in_id_order_and_reports_full_total() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();
    let created: Vec<_> = ["Stout", "Lager", "Porter"]
        .into_iter()
        .map(|name| store.create(&ItemPayload::named(name)).unwrap())
        .collect();

    let (items, total) = store.find_all("", PageRequest::new(1, 1)).unwrap();
    assert_eq!(total, 3);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, created[1].id);

    let (items, total) = store.find_all("", PageRequest::new(2, 2)).unwrap();
    assert_eq!(total, 3);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, created[2].id);
}

#[test]
fn zero_limit_uses_default_page_size() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();
    for index in 0..12 {
        store
            .create(&ItemPayload::named(format!("Ale {index:02}")))
            .unwrap();
    }

    let raw = PageRequest {
        limit: 0,
        offset: 0,
    };
    let (items, total) = store.find_all("", raw).unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(total, 12);
}

#[test]
fn try_new_bounds_lock_waits_on_foreign_connections() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();
    conn.busy_timeout(Duration::ZERO).unwrap();

    let store = SqliteItemStore::try_new(&conn).unwrap();

    let busy_ms: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(Duration::from_millis(busy_ms as u64), store.deadline());
}

#[test]
fn write_blocked_past_deadline_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.sqlite3");
    let holder = open_db(&path).unwrap();
    let conn = open_db(&path).unwrap();
    let store = SqliteItemStore::try_new(&conn)
        .unwrap()
        .with_deadline(Duration::from_millis(100))
        .unwrap();

    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let err = store.create(&ItemPayload::named("Lager")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Timeout {
            op: "item_store.create",
            ..
        }
    ));

    holder.execute_batch("ROLLBACK;").unwrap();
    store.create(&ItemPayload::named("Lager")).unwrap();
}

#[test]
fn store_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let result = SqliteItemStore::try_new(&conn);
    match result {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn store_rejects_connection_without_items_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteItemStore::try_new(&conn),
        Err(StoreError::MissingRequiredTable("items"))
    ));
}

#[test]
fn store_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category TEXT,
            description TEXT,
            image TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteItemStore::try_new(&conn),
        Err(StoreError::MissingRequiredColumn {
            table: "items",
            column: "deleted_at"
        })
    ));
}

#[test]
fn blank_persisted_name_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteItemStore::try_new(&conn).unwrap();
    let created = store.create(&ItemPayload::named("Lager")).unwrap();

    conn.execute_batch("PRAGMA ignore_check_constraints = ON;")
        .unwrap();
    conn.execute("UPDATE items SET name = '' WHERE id = ?1;", [created.id])
        .unwrap();

    assert!(matches!(
        store.find(created.id).unwrap_err(),
        StoreError::InvalidData {
            op: "item_store.find",
            ..
        }
    ));
}
