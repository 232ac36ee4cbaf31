//! Timers for the engine loop, and the debounced save scheduler.
//!
//! DESIGN
//! ======
//! The engine never sleeps. A timer is a spawned task that sleeps and then
//! posts an `EngineEvent` back into the engine queue through a weak sender,
//! so a pending timer never keeps a stopped engine alive. Cancelling a timer
//! aborts its task. Tests drive these timers with tokio's paused clock.
//!
//! `SaveScheduler` debounces persistence: the first `request_save()` arms one
//! timer, later requests while it is pending are absorbed, and the engine
//! snapshots the store when `SaveDue` arrives. The snapshot therefore reflects
//! the latest state at fire time, not the state at the first request.

use std::time::Duration;

use tokio::sync::mpsc::WeakSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::services::engine::EngineEvent;

/// Post `event` into the engine queue after `delay`.
pub fn schedule(delay: Duration, events: &WeakSender<EngineEvent>, event: EngineEvent) -> JoinHandle<()> {
    let events = events.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(events) = events.upgrade() else {
            debug!("scheduler: timer fired after engine stopped");
            return;
        };
        if events.send(event).await.is_err() {
            debug!("scheduler: engine queue closed before timer event");
        }
    })
}

// =============================================================================
// SAVE SCHEDULER
// =============================================================================

pub struct SaveScheduler {
    delay: Duration,
    timer: Option<JoinHandle<()>>,
    events: WeakSender<EngineEvent>,
}

impl SaveScheduler {
    #[must_use]
    pub fn new(delay: Duration, events: WeakSender<EngineEvent>) -> Self {
        Self { delay, timer: None, events }
    }

    /// Arm the timer unless a save is already pending. Returns `true` if this
    /// call armed it.
    pub fn request_save(&mut self) -> bool {
        if self.is_pending() {
            return false;
        }
        self.arm();
        true
    }

    /// Start a fresh delay window, replacing any pending timer.
    pub fn arm(&mut self) {
        self.cancel();
        self.timer = Some(schedule(self.delay, &self.events, EngineEvent::SaveDue));
    }

    /// Consume the pending flag when `SaveDue` arrives. Returns `false` for a
    /// stale event whose timer was already cancelled; the caller writes only
    /// on `true`.
    pub fn fire(&mut self) -> bool {
        self.timer.take().is_some()
    }

    /// Drop the pending save. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
