//! Deadline enforcement for blocking writes.
//!
//! The operation runs on a short-lived worker thread; the caller waits on a
//! channel for at most the deadline. Caller and worker race on a shared
//! [`CommitGate`]: the worker must pass the gate before its side effect, the
//! caller closes it once the deadline elapses. Exactly one of them wins, so
//! an `Elapsed { committed: false }` result guarantees the side effect never
//! happens.

use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const OPEN: u8 = 0;
const COMMITTED: u8 = 1;
const ABANDONED: u8 = 2;

#[derive(Debug)]
pub(crate) enum DeadlineError<E> {
    /// The deadline passed before the operation reported back. `committed`
    /// tells whether the worker had already passed the gate.
    Elapsed { deadline: Duration, committed: bool },
    /// The operation finished and failed.
    Failed(E),
    /// The worker ended without reporting (panicked).
    WorkerLost,
    /// The worker thread could not be started.
    Spawn(io::Error),
}

/// One-shot gate shared between a deadline caller and its worker.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    /// Claims the right to perform the side effect. Returns `false` once the
    /// caller has given up.
    pub(crate) fn commit(&self) -> bool {
        matches!(
            self.0
                .compare_exchange(OPEN, COMMITTED, Ordering::AcqRel, Ordering::Acquire),
            Ok(_) | Err(COMMITTED)
        )
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire) == ABANDONED
    }

    /// Closes the gate. Returns `false` when the worker already committed.
    fn abandon(&self) -> bool {
        matches!(
            self.0
                .compare_exchange(OPEN, ABANDONED, Ordering::AcqRel, Ordering::Acquire),
            Ok(_) | Err(ABANDONED)
        )
    }
}

pub(crate) fn run_with_deadline<T, E, F>(
    name: &str,
    deadline: Duration,
    op: F,
) -> Result<T, DeadlineError<E>>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce(&CommitGate) -> Result<T, E> + Send + 'static,
{
    let gate = CommitGate::default();
    let worker_gate = gate.clone();
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(format!("{name}-worker"))
        .spawn(move || {
            // Receiver is gone once the caller returned.
            let _ = tx.send(op(&worker_gate));
        })
        .map_err(DeadlineError::Spawn)?;

    match rx.recv_timeout(deadline) {
        Ok(result) => result.map_err(DeadlineError::Failed),
        Err(RecvTimeoutError::Disconnected) => Err(DeadlineError::WorkerLost),
        Err(RecvTimeoutError::Timeout) => {
            if gate.abandon() {
                return Err(DeadlineError::Elapsed {
                    deadline,
                    committed: false,
                });
            }
            // Committed in the last instant; report the outcome if it is in.
            match rx.try_recv() {
                Ok(result) => result.map_err(DeadlineError::Failed),
                Err(TryRecvError::Empty) => Err(DeadlineError::Elapsed {
                    deadline,
                    committed: true,
                }),
                Err(TryRecvError::Disconnected) => Err(DeadlineError::WorkerLost),
            }
        }
    }
}
