//! Audit log store contract and JSON-lines document collection.
//!
//! # Responsibility
//! - Append audit documents; no read, update or delete path exists.
//! - Assign a document id to every appended record.
//!
//! # Invariants
//! - One document per line; concurrent appends never interleave.
//! - Every append is bounded by the store deadline. An append reported as a
//!   timeout without `committed` never reaches the file.

use crate::model::audit::{AuditLogId, AuditLogRecord};
use crate::repo::deadline::{run_with_deadline, CommitGate, DeadlineError};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Deadline applied when the bootstrap does not configure one.
pub const DEFAULT_AUDIT_DEADLINE: Duration = Duration::from_secs(5);

/// How often a queued writer re-checks the lock and its gate.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(2);

pub type AuditStoreResult<T> = Result<T, AuditStoreError>;

#[derive(Debug, thiserror::Error)]
pub enum AuditStoreError {
    /// `committed` is set when the write had already started and may still
    /// land in the collection.
    #[error("audit append exceeded the {}ms deadline{}", .deadline.as_millis(), in_flight_note(.committed))]
    Timeout { deadline: Duration, committed: bool },
    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("audit log `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("audit writer stopped before reporting a result")]
    WriterLost,
}

/// Document store capability for the audit trail.
pub trait AuditLogStore {
    /// Appends one record and returns its assigned id.
    fn append(&self, record: &AuditLogRecord) -> AuditStoreResult<AuditLogId>;
}

impl<S: AuditLogStore + ?Sized> AuditLogStore for &S {
    fn append(&self, record: &AuditLogRecord) -> AuditStoreResult<AuditLogId> {
        (**self).append(record)
    }
}

#[derive(Serialize)]
struct AuditDocument<'a> {
    #[serde(rename = "_id")]
    id: AuditLogId,
    #[serde(flatten)]
    record: &'a AuditLogRecord,
}

/// Audit collection persisted as JSON lines in a single file.
///
/// Writers queue on an in-process lock. A writer still queued when its
/// deadline passes gives up without touching the file.
pub struct JsonlAuditLogStore {
    collection: Arc<JsonlCollection>,
    deadline: Duration,
}

struct JsonlCollection {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditLogStore {
    /// Opens (creating if needed) the collection file at `path`.
    ///
    /// # Errors
    /// Returns `Io` when the parent directory or file cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> AuditStoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AuditStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        open_for_append(&path)?;

        Ok(Self {
            collection: Arc::new(JsonlCollection {
                path,
                write_lock: Mutex::new(()),
            }),
            deadline: DEFAULT_AUDIT_DEADLINE,
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn path(&self) -> &Path {
        &self.collection.path
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl AuditLogStore for JsonlAuditLogStore {
    fn append(&self, record: &AuditLogRecord) -> AuditStoreResult<AuditLogId> {
        let id = Uuid::new_v4();
        let mut line = serde_json::to_string(&AuditDocument { id, record })?;
        line.push('\n');

        let collection = Arc::clone(&self.collection);
        let deadline = self.deadline;
        match run_with_deadline("audit-append", deadline, move |gate| {
            collection.write_line(&line, gate, deadline)
        }) {
            Ok(()) => Ok(id),
            Err(DeadlineError::Failed(err)) => Err(err),
            Err(DeadlineError::Elapsed {
                deadline,
                committed,
            }) => Err(AuditStoreError::Timeout {
                deadline,
                committed,
            }),
            Err(DeadlineError::WorkerLost) => Err(AuditStoreError::WriterLost),
            Err(DeadlineError::Spawn(source)) => Err(AuditStoreError::Io {
                path: self.collection.path.clone(),
                source,
            }),
        }
    }
}

impl JsonlCollection {
    fn write_line(&self, line: &str, gate: &CommitGate, deadline: Duration) -> AuditStoreResult<()> {
        let abandoned = AuditStoreError::Timeout {
            deadline,
            committed: false,
        };
        let Some(_guard) = self.lock_unless_abandoned(gate)? else {
            return Err(abandoned);
        };
        if !gate.commit() {
            return Err(abandoned);
        }

        let mut file = open_for_append(&self.path)?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|source| AuditStoreError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Waits for the write lock, returning `None` once the caller gave up.
    fn lock_unless_abandoned(&self, gate: &CommitGate) -> AuditStoreResult<Option<MutexGuard<'_, ()>>> {
        loop {
            match self.write_lock.try_lock() {
                Ok(guard) => return Ok(Some(guard)),
                Err(TryLockError::Poisoned(_)) => return Err(AuditStoreError::WriterLost),
                Err(TryLockError::WouldBlock) if gate.is_abandoned() => return Ok(None),
                Err(TryLockError::WouldBlock) => thread::sleep(LOCK_POLL_INTERVAL),
            }
        }
    }
}

fn in_flight_note(committed: &bool) -> &'static str {
    if *committed {
        " while the write was in flight"
    } else {
        ""
    }
}

fn open_for_append(path: &Path) -> AuditStoreResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| AuditStoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}
