//! Broadcast engine: apply an edit, schedule a save, fan it out.
//!
//! Strokes go to every open connection except the sender, whose client has
//! already drawn it. Fills go to everyone, sender included, because they
//! carry the new canonical background. Connections that are mid catch-up get
//! the message queued behind their replay instead of interleaved with it.

use tracing::{debug, info};

use crate::canvas::StrokeInput;
use crate::message::ServerMessage;
use crate::services::catchup::Catchup;
use crate::services::engine::Engine;
use crate::services::registry::{ConnectionId, Registry};

impl Engine {
    pub(super) fn apply_stroke(&mut self, sender: ConnectionId, input: StrokeInput) {
        let stroke = self.store.apply_stroke(input);
        self.saves.request_save();
        let delivered = fan_out(&self.registry, &mut self.catchup, &ServerMessage::Stroke(stroke), Some(sender));
        debug!(%sender, delivered, strokes = self.store.strokes().len(), "broadcast: stroke");
    }

    pub(super) fn apply_fill(&mut self, sender: ConnectionId, color: Option<String>) {
        let color = self.store.apply_fill(color);
        self.saves.request_save();
        let message = ServerMessage::Fill { color };
        let delivered = fan_out(&self.registry, &mut self.catchup, &message, None);
        info!(%sender, background = %self.store.background_color(), delivered, "broadcast: canvas filled");
    }
}

/// Send `message` to every open connection except `exclude`. Returns how
/// many connections it was sent or queued for.
pub fn fan_out(
    registry: &Registry,
    catchup: &mut Catchup,
    message: &ServerMessage,
    exclude: Option<ConnectionId>,
) -> usize {
    let mut delivered = 0;
    registry.for_each_open_matching(
        |id, _| Some(id) != exclude,
        |id, connection| match catchup.defer(id, message.clone()) {
            None => delivered += 1,
            Some(message) => {
                if connection.send(message) {
                    delivered += 1;
                }
            }
        },
    );
    delivered
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
