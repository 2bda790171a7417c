//! Background snapshot refresh.
//!
//! # Responsibility
//! - Read a full contact snapshot on a worker thread with its own connection.
//! - Publish the result only after the whole read finished.
//!
//! # Invariants
//! - A handle yields at most one result.
//! - No cancellation, timeout or retry.

use super::contact_service::{ContactService, ContactServiceError, ContactSnapshot};
use crate::db::open_db;
use crate::repo::contact_repo::RepoError;
use crate::repo::sqlite_repo::SqliteContactRepository;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Failure of a background refresh.
#[derive(Debug)]
pub enum RefreshError {
    /// Snapshot read failed.
    Service(ContactServiceError),
    /// Worker stopped without reporting a result.
    WorkerLost,
}

impl Display for RefreshError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service(err) => write!(f, "{err}"),
            Self::WorkerLost => write!(f, "refresh worker stopped without a result"),
        }
    }
}

impl Error for RefreshError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Service(err) => Some(err),
            Self::WorkerLost => None,
        }
    }
}

impl From<ContactServiceError> for RefreshError {
    fn from(value: ContactServiceError) -> Self {
        Self::Service(value)
    }
}

type RefreshOutcome = Result<ContactSnapshot, ContactServiceError>;

/// Handle to one in-flight snapshot read.
pub struct RefreshHandle {
    receiver: Receiver<RefreshOutcome>,
    worker: Option<JoinHandle<()>>,
    delivered: bool,
}

impl RefreshHandle {
    /// Returns the result when the read has completed, `None` otherwise.
    ///
    /// After a result has been returned once, always returns `None`.
    pub fn try_take(&mut self) -> Option<Result<ContactSnapshot, RefreshError>> {
        if self.delivered {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(outcome) => outcome.map_err(RefreshError::from),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(RefreshError::WorkerLost),
        };
        self.delivered = true;
        self.join_worker();
        Some(outcome)
    }

    /// Blocks until the read has completed.
    pub fn wait(mut self) -> Result<ContactSnapshot, RefreshError> {
        if self.delivered {
            return Err(RefreshError::WorkerLost);
        }
        let outcome = self.receiver.recv().map_err(|_| RefreshError::WorkerLost);
        self.delivered = true;
        self.join_worker();
        Ok(outcome??)
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("event=snapshot_refresh module=service status=error error_code=worker_panicked");
            }
        }
    }
}

/// Starts reading a full snapshot of the database at `db_path` in the
/// background.
pub fn spawn_snapshot_refresh(db_path: impl Into<PathBuf>) -> RefreshHandle {
    let db_path = db_path.into();
    let (sender, receiver) = mpsc::channel();

    let worker = thread::spawn(move || {
        let started_at = Instant::now();
        let outcome = read_snapshot(&db_path);
        match &outcome {
            Ok(snapshot) => info!(
                "event=snapshot_refresh module=service status=ok organizations={} units={} persons={} duration_ms={}",
                snapshot.organizations.len(),
                snapshot.units.len(),
                snapshot.persons.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=snapshot_refresh module=service status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        // Receiver may already be gone; the result is then dropped.
        let _ = sender.send(outcome);
    });

    RefreshHandle {
        receiver,
        worker: Some(worker),
        delivered: false,
    }
}

fn read_snapshot(db_path: &std::path::Path) -> RefreshOutcome {
    let conn = open_db(db_path).map_err(RepoError::from)?;
    let repo = SqliteContactRepository::try_new(&conn)?;
    ContactService::new(repo).snapshot()
}
