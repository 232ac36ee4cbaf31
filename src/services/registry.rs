//! Connection registry: who is connected and what they announced.
//!
//! DESIGN
//! ======
//! Each websocket connection is registered under a fresh `ConnectionId` with
//! role `Unknown` and an unbounded outbound queue. The registry is the only
//! record of live connections. Roles are plain metadata on the entry and are
//! reported back through `announce`.
//!
//! A connection counts as open while the socket task still holds the
//! receiving half of its outbound queue. Iteration skips closed entries even
//! before their `Disconnected` event has been processed.

use std::collections::HashMap;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::message::{Role, ServerMessage};

pub type ConnectionId = Uuid;

// =============================================================================
// CONNECTION
// =============================================================================

pub struct Connection {
    role: Role,
    /// Set by the first accepted `hello`.
    greeted: bool,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue a message for the socket task. Returns `false` if the socket is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbound.send(message).is_ok()
    }
}

/// What a `hello` changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChange {
    pub previous: Role,
    pub current: Role,
    /// True for the connection's first accepted `hello`.
    pub first_hello: bool,
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ConnectionId, outbound: mpsc::UnboundedSender<ServerMessage>) {
        self.connections.insert(id, Connection { role: Role::Unknown, greeted: false, outbound });
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Record a role announcement. Later announcements overwrite the role.
    /// Returns `None` for an unregistered connection.
    pub fn announce(&mut self, id: ConnectionId, role: Role) -> Option<RoleChange> {
        let connection = self.connections.get_mut(&id)?;
        let change = RoleChange { previous: connection.role, current: role, first_hello: !connection.greeted };
        connection.role = role;
        connection.greeted = true;
        Some(change)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Visit every open connection accepted by `predicate`.
    pub fn for_each_open_matching(
        &self,
        mut predicate: impl FnMut(ConnectionId, &Connection) -> bool,
        mut visit: impl FnMut(ConnectionId, &Connection),
    ) {
        for (id, connection) in &self.connections {
            if !connection.is_open() || !predicate(*id, connection) {
                continue;
            }
            visit(*id, connection);
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
