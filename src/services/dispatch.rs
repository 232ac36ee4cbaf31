//! Message dispatcher: per-connection handling of inbound frames.
//!
//! A connection starts `Unknown` and becomes `Browser` or `Device` on its first
//! valid `hello`. Only that first `hello` can start a catch-up, and only for a
//! browser. Later hellos overwrite the role without replaying anything.
//! Malformed frames are logged and dropped; the connection stays open.

use tracing::{debug, info, warn};

use crate::message::{ClientMessage, Role, parse_client_message};
use crate::services::engine::Engine;
use crate::services::registry::ConnectionId;

impl Engine {
    pub(super) fn dispatch(&mut self, id: ConnectionId, text: &str) {
        if !self.registry.contains(id) {
            debug!(%id, "dispatch: message from unregistered connection");
            return;
        }

        match parse_client_message(text) {
            Ok(Some(ClientMessage::Hello { role })) => self.hello(id, role),
            Ok(Some(ClientMessage::Stroke(input))) => self.apply_stroke(id, input),
            Ok(Some(ClientMessage::Fill { color })) => self.apply_fill(id, color),
            Ok(None) => debug!(%id, "dispatch: ignoring unrecognized message"),
            Err(e) => warn!(%id, error = %e, "dispatch: dropping malformed message"),
        }
    }

    fn hello(&mut self, id: ConnectionId, role: Role) {
        let Some(change) = self.registry.announce(id, role) else {
            return;
        };

        if !change.first_hello {
            if change.previous != change.current {
                info!(%id, previous = ?change.previous, role = ?change.current, "dispatch: role changed");
            }
            return;
        }

        info!(%id, role = ?role, "dispatch: client identified");
        if role != Role::Browser {
            return;
        }
        if let Some(connection) = self.registry.get(id) {
            self.catchup.start(id, connection, self.store.background_color(), self.store.strokes());
        }
    }
}
