//! Synchronization engine: the single owner of canvas and connection state.
//!
//! ARCHITECTURE
//! ============
//! One task runs `Engine::run` over a bounded queue of `EngineEvent`s.
//! Socket tasks talk to it through a cloneable `EngineHandle`; timers post
//! events back through a weak sender. Every mutation of the store, the
//! registry, the replays and the save scheduler happens inside this loop, so
//! none of them need locks.
//!
//! ```text
//!   ws task ──Connected/Inbound/Disconnected──▶ ┌────────┐ ──ServerMessage──▶ ws task
//!   timers  ──CatchupDue/SaveDue──────────────▶ │ Engine │ ──String─────────▶ writer
//!   main    ──Shutdown────────────────────────▶ └────────┘
//! ```
//!
//! LIFECYCLE
//! =========
//! The loop ends on `Shutdown` or when every handle is dropped. A save that
//! is still pending at that point is written before the task returns.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::canvas::CanvasStore;
use crate::message::ServerMessage;
use crate::services::catchup::{Catchup, CatchupConfig};
use crate::services::persistence::{Enqueued, enqueue_snapshot};
use crate::services::registry::{ConnectionId, Registry};
use crate::services::scheduler::SaveScheduler;
use crate::services::storage::encode_state;

pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug)]
pub enum EngineEvent {
    /// A socket was accepted. `outbound` feeds that socket's writer.
    Connected { id: ConnectionId, outbound: mpsc::UnboundedSender<ServerMessage> },
    /// One text frame from a client.
    Inbound { id: ConnectionId, text: String },
    Disconnected { id: ConnectionId },
    /// Next catch-up chunk for `id` is due.
    CatchupDue { id: ConnectionId },
    /// Debounce window elapsed.
    SaveDue,
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine is not running")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub save_delay: Duration,
    pub catchup: CatchupConfig,
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_delay: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            catchup: CatchupConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable sender side of the engine queue.
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Register a new connection.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` if the engine loop has stopped.
    pub async fn connect(
        &self,
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(), EngineError> {
        self.send(EngineEvent::Connected { id, outbound }).await
    }

    /// Forward one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` if the engine loop has stopped.
    pub async fn inbound(&self, id: ConnectionId, text: String) -> Result<(), EngineError> {
        self.send(EngineEvent::Inbound { id, text }).await
    }

    /// Report that a connection closed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` if the engine loop has stopped.
    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), EngineError> {
        self.send(EngineEvent::Disconnected { id }).await
    }

    /// Ask the loop to flush and stop.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` if the engine loop has already stopped.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(EngineEvent::Shutdown).await
    }

    async fn send(&self, event: EngineEvent) -> Result<(), EngineError> {
        self.events.send(event).await.map_err(|_| EngineError::Closed)
    }
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct Engine {
    pub(super) store: CanvasStore,
    pub(super) registry: Registry,
    pub(super) catchup: Catchup,
    pub(super) saves: SaveScheduler,
    writer: mpsc::Sender<String>,
}

/// Start the engine loop on a loaded `store`. Snapshots go to `writer`.
#[must_use]
pub fn spawn_engine(
    store: CanvasStore,
    config: EngineConfig,
    writer: mpsc::Sender<String>,
) -> (EngineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let engine = Engine::new(store, config, writer, tx.downgrade());
    let task = tokio::spawn(engine.run(rx));
    (EngineHandle { events: tx }, task)
}

impl Engine {
    fn new(
        store: CanvasStore,
        config: EngineConfig,
        writer: mpsc::Sender<String>,
        events: mpsc::WeakSender<EngineEvent>,
    ) -> Self {
        Self {
            store,
            registry: Registry::new(),
            catchup: Catchup::new(config.catchup, events.clone()),
            saves: SaveScheduler::new(config.save_delay, events),
            writer,
        }
    }

    async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        info!(
            background = %self.store.background_color(),
            strokes = self.store.strokes().len(),
            save_delay = ?self.saves.delay(),
            "engine: started"
        );

        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }

        self.flush_pending_save().await;
        if self.registry.is_empty() {
            info!("engine: stopped");
        } else {
            info!(connections = self.registry.len(), "engine: stopped with clients still connected");
        }
    }

    fn handle(&mut self, event: EngineEvent) -> ControlFlow<()> {
        match event {
            EngineEvent::Connected { id, outbound } => {
                self.registry.add(id, outbound);
                info!(%id, connections = self.registry.len(), "engine: client connected");
            }
            EngineEvent::Inbound { id, text } => self.dispatch(id, &text),
            EngineEvent::Disconnected { id } => self.disconnect(id),
            EngineEvent::CatchupDue { id } => self.catchup.resume(id, self.registry.get(id)),
            EngineEvent::SaveDue => {
                if self.saves.fire() {
                    self.persist_snapshot();
                }
            }
            EngineEvent::Shutdown => {
                info!("engine: shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn disconnect(&mut self, id: ConnectionId) {
        self.catchup.cancel(id);
        if self.registry.remove(id).is_none() {
            debug!(%id, "engine: disconnect for unknown connection");
            return;
        }
        self.saves.request_save();
        info!(%id, connections = self.registry.len(), "engine: client disconnected");
    }

    fn persist_snapshot(&mut self) {
        let payload = match encode_state(&self.store.snapshot()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "engine: failed to serialize state");
                return;
            }
        };
        match enqueue_snapshot(&self.writer, payload) {
            Enqueued::Queued => {
                debug!(strokes = self.store.strokes().len(), "engine: snapshot queued");
            }
            Enqueued::Full => self.saves.arm(),
            Enqueued::Closed => {}
        }
    }

    async fn flush_pending_save(&mut self) {
        if !self.saves.cancel() {
            return;
        }
        let payload = match encode_state(&self.store.snapshot()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "engine: failed to serialize final state");
                return;
            }
        };
        if self.writer.send(payload).await.is_err() {
            warn!("engine: writer closed before final save");
        } else {
            info!(strokes = self.store.strokes().len(), "engine: final save queued");
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
