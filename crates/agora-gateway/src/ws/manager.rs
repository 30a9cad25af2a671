use crate::ws::protocol::ServerFrame;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound queue depth per connection; slow consumers lose frames rather
/// than stalling the run.
const CONNECTION_BUFFER: usize = 256;

pub type ConnectionId = Uuid;

struct Connection {
    user_id: String,
    tx: mpsc::Sender<ServerFrame>,
}

/// Registry of live WebSocket connections.
///
/// Connections are keyed by id and indexed by user so delivery can fan out
/// to every socket a user has open. Run events reach sockets only through
/// `send_to_user`, which keeps one user's events from ever reaching
/// another user's socket.
#[derive(Default)]
pub struct WsManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    by_user: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id`; the receiver is the outbound
    /// frame queue the session writer drains.
    pub fn register(&self, user_id: &str) -> (ConnectionId, mpsc::Receiver<ServerFrame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);

        self.connections.write().insert(
            id,
            Connection {
                user_id: user_id.to_string(),
                tx,
            },
        );
        self.by_user
            .write()
            .entry(user_id.to_string())
            .or_default()
            .insert(id);

        tracing::debug!(%id, user = user_id, "websocket connection registered");
        (id, rx)
    }

    pub fn unregister(&self, id: ConnectionId) {
        let removed = self.connections.write().remove(&id);
        if let Some(connection) = removed {
            let mut by_user = self.by_user.write();
            if let Some(set) = by_user.get_mut(&connection.user_id) {
                set.remove(&id);
                if set.is_empty() {
                    by_user.remove(&connection.user_id);
                }
            }
            tracing::debug!(%id, user = %connection.user_id, "websocket connection removed");
        }
    }

    /// Deliver a frame to every connection of `user_id`; returns how many
    /// connections accepted it.
    pub fn send_to_user(&self, user_id: &str, frame: &ServerFrame) -> usize {
        let ids: Vec<ConnectionId> = match self.by_user.read().get(user_id) {
            Some(set) => set.iter().copied().collect(),
            None => return 0,
        };

        let connections = self.connections.read();
        let mut delivered = 0;
        for id in ids {
            if let Some(connection) = connections.get(&id) {
                match connection.tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        tracing::warn!(%id, user = user_id, error = %e, "dropping frame for slow or closed connection");
                    }
                }
            }
        }
        delivered
    }

    /// Deliver a frame to one connection.
    pub fn send_to_connection(&self, id: ConnectionId, frame: ServerFrame) -> bool {
        match self.connections.read().get(&id) {
            Some(connection) => connection.tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn user_connection_count(&self, user_id: &str) -> usize {
        self.by_user
            .read()
            .get(user_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}
