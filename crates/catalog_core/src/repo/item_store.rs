//! Item store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide find/search/create/update/soft-delete over the `items` table.
//! - Keep SQL details inside the relational store boundary.
//!
//! # Invariants
//! - Soft-deleted rows are invisible to every read and are never revived.
//! - `find_all` counts with the same filter it pages with, inside one read
//!   transaction.
//! - Every call installs a progress handler that interrupts the statement once
//!   the store deadline passes.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{DbError, DbResult, DEFAULT_BUSY_TIMEOUT};
use crate::model::item::{Item, ItemId, ItemPayload, ItemValidationError};
use crate::model::page::PageRequest;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::os::raw::c_int;
use std::time::{Duration, Instant};

/// Deadline applied when the bootstrap does not configure one.
pub const DEFAULT_STORE_DEADLINE: Duration = DEFAULT_BUSY_TIMEOUT;

/// SQLite VM instructions between deadline checks.
const PROGRESS_CHECK_OPS: c_int = 1_000;

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    category,
    description,
    image,
    created_at,
    updated_at,
    deleted_at
FROM items";

/// `?1` is the escaped `LIKE` pattern, or NULL for no search filter.
const ACTIVE_FILTER_SQL: &str =
    "WHERE deleted_at IS NULL AND (?1 IS NULL OR name LIKE ?1 ESCAPE '\\')";

const REQUIRED_ITEM_COLUMNS: [&str; 8] = [
    "id",
    "name",
    "category",
    "description",
    "image",
    "created_at",
    "updated_at",
    "deleted_at",
];

pub type StoreResult<T> = Result<T, StoreError>;

/// Item store error for persistence and query operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(ItemId),
    #[error(transparent)]
    Validation(#[from] ItemValidationError),
    #[error("{op} exceeded the {}ms store deadline", .deadline.as_millis())]
    Timeout { op: &'static str, deadline: Duration },
    #[error("{op}: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("{op}: invalid persisted item data: {message}")]
    InvalidData { op: &'static str, message: String },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(
        "connection is not migrated: schema version {actual_version}, expected {expected_version}"
    )]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("required table `{0}` is missing")]
    MissingRequiredTable(&'static str),
    #[error("required column `{table}.{column}` is missing")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Relational store capability for catalog items.
pub trait ItemStore {
    /// Loads one active item.
    fn find(&self, id: ItemId) -> StoreResult<Item>;
    /// Returns one page of active items whose name starts with `search`, plus
    /// the total number of items matching the same filter.
    fn find_all(&self, search: &str, page: PageRequest) -> StoreResult<(Vec<Item>, u64)>;
    /// Inserts a new item; id and timestamps are assigned by the store.
    fn create(&self, payload: &ItemPayload) -> StoreResult<Item>;
    /// Replaces the mutable fields of the active item with `item.id`.
    fn update(&self, item: &Item) -> StoreResult<Item>;
    /// Tombstones the active item with `id`.
    fn delete(&self, id: ItemId) -> StoreResult<()>;
}

impl<S: ItemStore + ?Sized> ItemStore for &S {
    fn find(&self, id: ItemId) -> StoreResult<Item> {
        (**self).find(id)
    }

    fn find_all(&self, search: &str, page: PageRequest) -> StoreResult<(Vec<Item>, u64)> {
        (**self).find_all(search, page)
    }

    fn create(&self, payload: &ItemPayload) -> StoreResult<Item> {
        (**self).create(payload)
    }

    fn update(&self, item: &Item) -> StoreResult<Item> {
        (**self).update(item)
    }

    fn delete(&self, id: ItemId) -> StoreResult<()> {
        (**self).delete(id)
    }
}

/// SQLite-backed item store.
pub struct SqliteItemStore<'conn> {
    conn: &'conn Connection,
    deadline: Duration,
}

impl<'conn> SqliteItemStore<'conn> {
    /// Constructs a store from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` when the schema is
    ///   not the one this binary expects.
    /// The connection's busy timeout is reset to the default deadline.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_item_connection_ready(conn)?;
        Self {
            conn,
            deadline: DEFAULT_STORE_DEADLINE,
        }
        .with_deadline(DEFAULT_STORE_DEADLINE)
    }

    /// Sets the per-call deadline, also used as the lock-wait timeout.
    pub fn with_deadline(mut self, deadline: Duration) -> StoreResult<Self> {
        self.conn
            .busy_timeout(deadline)
            .map_err(|source| StoreError::Backend {
                op: "item_store.configure",
                source,
            })?;
        self.deadline = deadline;
        Ok(self)
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs `f` with the deadline progress handler installed.
    fn guarded<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let expires_at = Instant::now() + self.deadline;
        self.conn
            .progress_handler(PROGRESS_CHECK_OPS, Some(move || Instant::now() >= expires_at));
        let result = f(self.conn);
        self.conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|err| classify_sqlite_error(op, self.deadline, expires_at, err))
    }
}

impl ItemStore for SqliteItemStore<'_> {
    fn find(&self, id: ItemId) -> StoreResult<Item> {
        const OP: &str = "item_store.find";
        let item = self.guarded(OP, |conn| {
            conn.query_row(
                &format!("{ITEM_SELECT_SQL} WHERE id = ?1 AND deleted_at IS NULL;"),
                [id],
                read_item_row,
            )
            .optional()
        })?;

        match item {
            Some(item) => check_persisted(OP, item),
            None => Err(StoreError::NotFound(id)),
        }
    }

    fn find_all(&self, search: &str, page: PageRequest) -> StoreResult<(Vec<Item>, u64)> {
        const OP: &str = "item_store.find_all";
        let page = PageRequest::new(page.limit, page.offset);
        let pattern = prefix_pattern(search);

        let (items, total) = self.guarded(OP, |conn| {
            let tx = conn.unchecked_transaction()?;
            let total: i64 = tx.query_row(
                &format!("SELECT COUNT(*) FROM items {ACTIVE_FILTER_SQL};"),
                params![pattern],
                |row| row.get(0),
            )?;
            let items = {
                let mut stmt = tx.prepare(&format!(
                    "{ITEM_SELECT_SQL} {ACTIVE_FILTER_SQL} ORDER BY id ASC LIMIT ?2 OFFSET ?3;"
                ))?;
                let rows =
                    stmt.query_map(params![pattern, page.limit, page.offset], read_item_row)?;
                let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                items
            };
            tx.commit()?;
            Ok((items, total))
        })?;

        let items = items
            .into_iter()
            .map(|item| check_persisted(OP, item))
            .collect::<StoreResult<Vec<_>>>()?;
        let total = u64::try_from(total).map_err(|_| StoreError::InvalidData {
            op: OP,
            message: format!("negative row count {total}"),
        })?;

        Ok((items, total))
    }

    fn create(&self, payload: &ItemPayload) -> StoreResult<Item> {
        payload.validate()?;
        let now = now_millis();

        let item = self.guarded("item_store.create", |conn| {
            conn.execute(
                "INSERT INTO items (
                    name,
                    category,
                    description,
                    image,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
                params![
                    payload.name.as_str(),
                    payload.category.as_deref(),
                    payload.description.as_deref(),
                    payload.image.as_deref(),
                    now,
                ],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("{ITEM_SELECT_SQL} WHERE id = ?1;"),
                [id],
                read_item_row,
            )
        })?;

        Ok(item)
    }

    fn update(&self, item: &Item) -> StoreResult<Item> {
        item.payload().validate()?;
        let now = now_millis();

        let updated = self.guarded("item_store.update", |conn| {
            let changed = conn.execute(
                "UPDATE items
                 SET
                    name = ?2,
                    category = ?3,
                    description = ?4,
                    image = ?5,
                    updated_at = MAX(?6, updated_at)
                 WHERE id = ?1
                   AND deleted_at IS NULL;",
                params![
                    item.id,
                    item.name.as_str(),
                    item.category.as_deref(),
                    item.description.as_deref(),
                    item.image.as_deref(),
                    now,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            conn.query_row(
                &format!("{ITEM_SELECT_SQL} WHERE id = ?1;"),
                [item.id],
                read_item_row,
            )
            .map(Some)
        })?;

        updated.ok_or(StoreError::NotFound(item.id))
    }

    fn delete(&self, id: ItemId) -> StoreResult<()> {
        let now = now_millis();
        let changed = self.guarded("item_store.delete", |conn| {
            conn.execute(
                "UPDATE items
                 SET
                    deleted_at = ?2,
                    updated_at = MAX(?2, updated_at)
                 WHERE id = ?1
                   AND deleted_at IS NULL;",
                params![id, now],
            )
        })?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        Ok(())
    }
}

fn read_item_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get("id")?,
        name: row.get("name")?,
        category: row.get("category")?,
        description: row.get("description")?,
        image: row.get("image")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn check_persisted(op: &'static str, item: Item) -> StoreResult<Item> {
    item.payload()
        .validate()
        .map_err(|err| StoreError::InvalidData {
            op,
            message: format!("item {}: {err}", item.id),
        })?;
    Ok(item)
}

/// BUSY/LOCKED count as a timeout only once the deadline has passed; SQLite
/// also returns them without waiting, e.g. on a lock-upgrade deadlock.
fn classify_sqlite_error(
    op: &'static str,
    deadline: Duration,
    expires_at: Instant,
    err: rusqlite::Error,
) -> StoreError {
    let timed_out = match err.sqlite_error_code() {
        Some(ErrorCode::OperationInterrupted) => true,
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Instant::now() >= expires_at,
        _ => false,
    };

    if timed_out {
        StoreError::Timeout { op, deadline }
    } else {
        StoreError::Backend { op, source: err }
    }
}

/// Builds a `LIKE` prefix pattern with `%`, `_` and `\` escaped.
fn prefix_pattern(search: &str) -> Option<String> {
    if search.is_empty() {
        return None;
    }

    let mut pattern = String::with_capacity(search.len() + 1);
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn ensure_item_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version > expected_version {
        return Err(StoreError::Db(DbError::UnsupportedSchemaVersion {
            db_version: actual_version,
            latest_supported: expected_version,
        }));
    }
    if actual_version < expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "items")? {
        return Err(StoreError::MissingRequiredTable("items"));
    }

    for column in REQUIRED_ITEM_COLUMNS {
        if !table_has_column(conn, "items", column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: "items",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
