//! Persistence writer: serialized background writes of canvas snapshots.
//!
//! DESIGN
//! ======
//! The engine serializes a snapshot inside its loop and hands the payload to
//! this worker through a small bounded queue with `try_send`, so the loop never
//! waits on disk I/O. One worker means writes land in the order they were
//! queued. When the engine drops its sender the worker drains what is queued
//! and exits.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is logged and dropped. The next mutation schedules another
//! save, which carries the full state, so nothing is retried here.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::storage::CanvasStorage;

/// Snapshots waiting to be written. Debouncing keeps this nearly empty.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 4;

/// Outcome of handing a snapshot to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Queue is full; the caller should try again later.
    Full,
    /// Writer has stopped; the snapshot is lost.
    Closed,
}

/// Spawn the writer task and return its queue sender.
#[must_use]
pub fn spawn_persistence_worker(storage: Arc<dyn CanvasStorage>) -> (mpsc::Sender<String>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<String>(DEFAULT_WRITE_QUEUE_CAPACITY);
    info!(queue_capacity = DEFAULT_WRITE_QUEUE_CAPACITY, "persistence: writer started");

    let worker = tokio::spawn(async move {
        let mut written = 0_usize;
        while let Some(payload) = rx.recv().await {
            match storage.save(&payload).await {
                Ok(()) => {
                    written += 1;
                    debug!(bytes = payload.len(), "persistence: state saved");
                }
                Err(e) => {
                    error!(error = %e, bytes = payload.len(), "persistence: failed to save state");
                }
            }
        }
        info!(written, "persistence: writer stopped");
    });

    (tx, worker)
}

/// Non-blocking hand-off of one serialized snapshot.
pub fn enqueue_snapshot(tx: &mpsc::Sender<String>, payload: String) -> Enqueued {
    let bytes = payload.len();
    match tx.try_send(payload) {
        Ok(()) => Enqueued::Queued,
        Err(TrySendError::Full(_)) => {
            warn!(bytes, "persistence: write queue full; save deferred");
            Enqueued::Full
        }
        Err(TrySendError::Closed(_)) => {
            warn!(bytes, "persistence: writer closed; dropping snapshot");
            Enqueued::Closed
        }
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
