//! Catch-up protocol: bring a newly identified browser up to date.
//!
//! DESIGN
//! ======
//! A replay sends the current background as one `fill`, then the strokes in
//! insertion order in fixed-size chunks. The first chunk goes out right away;
//! each following chunk waits for a `CatchupDue` timer event, so the engine
//! keeps serving other connections between chunks.
//!
//! The strokes are copied when the replay starts. A fill that lands mid-replay
//! therefore cannot corrupt the chunks still to be sent.
//!
//! ORDERING
//! ========
//! Live broadcasts addressed to a connection that is mid-replay are deferred
//! and flushed right after the final chunk. The receiver sees the replayed
//! prefix followed by live events in the order the engine accepted them.
//!
//! CANCELLATION
//! ============
//! Before every chunk the connection is checked. A closed connection ends the
//! replay silently and discards its deferred messages. `cancel` also aborts a
//! pending chunk timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::WeakSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::canvas::Stroke;
use crate::message::ServerMessage;
use crate::services::engine::EngineEvent;
use crate::services::registry::{Connection, ConnectionId};
use crate::services::scheduler::schedule;

pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchupConfig {
    /// Strokes per chunk. Never zero.
    pub chunk_size: usize,
    /// Pause between chunks.
    pub chunk_delay: Duration,
}

impl Default for CatchupConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, chunk_delay: Duration::from_millis(DEFAULT_CHUNK_DELAY_MS) }
    }
}

struct Replay {
    strokes: Arc<[Stroke]>,
    next: usize,
    deferred: Vec<ServerMessage>,
    timer: Option<JoinHandle<()>>,
}

impl Replay {
    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// =============================================================================
// CATCHUP
// =============================================================================

pub struct Catchup {
    config: CatchupConfig,
    replays: HashMap<ConnectionId, Replay>,
    events: WeakSender<EngineEvent>,
}

impl Catchup {
    #[must_use]
    pub fn new(config: CatchupConfig, events: WeakSender<EngineEvent>) -> Self {
        let config = CatchupConfig { chunk_size: config.chunk_size.max(1), ..config };
        Self { config, replays: HashMap::new(), events }
    }

    /// Send `background` and begin replaying `strokes` to `connection`.
    pub fn start(&mut self, id: ConnectionId, connection: &Connection, background: &str, strokes: &[Stroke]) {
        self.cancel(id);
        if !connection.is_open() {
            return;
        }

        info!(%id, background, strokes = strokes.len(), "catchup: sending full state");
        connection.send(ServerMessage::Fill { color: background.to_owned() });
        if strokes.is_empty() {
            return;
        }

        self.replays.insert(
            id,
            Replay { strokes: Arc::from(strokes), next: 0, deferred: Vec::new(), timer: None },
        );
        self.send_chunk(id, connection);
    }

    /// Continue a replay when its chunk timer fires. `connection` is `None`
    /// once the connection has left the registry.
    pub fn resume(&mut self, id: ConnectionId, connection: Option<&Connection>) {
        let Some(replay) = self.replays.get_mut(&id) else {
            return;
        };
        replay.timer = None;
        match connection {
            Some(connection) => self.send_chunk(id, connection),
            None => self.cancel(id),
        }
    }

    /// Queue `message` behind an in-flight replay. Hands the message back
    /// when `id` is not replaying, so the caller sends it directly.
    pub fn defer(&mut self, id: ConnectionId, message: ServerMessage) -> Option<ServerMessage> {
        match self.replays.get_mut(&id) {
            Some(replay) => {
                replay.deferred.push(message);
                None
            }
            None => Some(message),
        }
    }

    /// Abandon the replay for `id`, if any.
    pub fn cancel(&mut self, id: ConnectionId) {
        if let Some(mut replay) = self.replays.remove(&id) {
            replay.abort_timer();
            debug!(%id, sent = replay.next, total = replay.strokes.len(), "catchup: replay cancelled");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, id: ConnectionId) -> bool {
        self.replays.contains_key(&id)
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.replays.len()
    }

    fn send_chunk(&mut self, id: ConnectionId, connection: &Connection) {
        if !connection.is_open() {
            self.cancel(id);
            return;
        }
        let Some(replay) = self.replays.get_mut(&id) else {
            return;
        };

        let total = replay.strokes.len();
        let end = (replay.next + self.config.chunk_size).min(total);
        for stroke in &replay.strokes[replay.next..end] {
            connection.send(ServerMessage::Stroke(stroke.clone()));
        }
        replay.next = end;

        if end < total {
            replay.timer = Some(schedule(self.config.chunk_delay, &self.events, EngineEvent::CatchupDue { id }));
            return;
        }

        if let Some(replay) = self.replays.remove(&id) {
            let deferred = replay.deferred.len();
            for message in replay.deferred {
                connection.send(message);
            }
            info!(%id, strokes = total, deferred, "catchup: replay complete");
        }
    }
}

impl Drop for Catchup {
    fn drop(&mut self) {
        for replay in self.replays.values_mut() {
            replay.abort_timer();
        }
    }
}

#[cfg(test)]
#[path = "catchup_test.rs"]
mod tests;
