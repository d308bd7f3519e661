use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use uuid::Uuid;

/// Outbound channel for one connected client. A single writer task per
/// connection drains the channel, so replies and broadcasts share one
/// ordered path onto the socket.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub sender: mpsc::UnboundedSender<Message>,
    pub connected_at: DateTime<Utc>,
}

/// In-memory registry of connected clients
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<Uuid, ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new client connection, returning its id
    pub fn register(&self, sender: mpsc::UnboundedSender<Message>) -> Uuid {
        let id = Uuid::new_v4();
        let handle = ClientHandle {
            sender,
            connected_at: Utc::now(),
        };
        self.clients.write().insert(id, handle);
        id
    }

    /// Remove a client; returns how many clients remain
    pub fn unregister(&self, id: &Uuid) -> usize {
        let mut clients = self.clients.write();
        clients.remove(id);
        clients.len()
    }

    /// Count of currently connected clients
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Queue a message for one client; false if the client is gone
    pub fn send_to(&self, id: &Uuid, message: Message) -> bool {
        self.clients
            .read()
            .get(id)
            .map(|handle| handle.sender.send(message).is_ok())
            .unwrap_or(false)
    }

    /// Fan a text frame out to every connected client, pruning clients
    /// whose channel has closed underneath us.
    pub fn broadcast(&self, text: &str) {
        let mut closed = Vec::new();
        {
            let clients = self.clients.read();
            for (id, handle) in clients.iter() {
                if handle.sender.send(Message::Text(text.into())).is_err() {
                    closed.push(*id);
                }
            }
        }
        if !closed.is_empty() {
            let mut clients = self.clients.write();
            for id in closed {
                debug!(client_id = %id, "pruning client with closed channel");
                clients.remove(&id);
            }
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
