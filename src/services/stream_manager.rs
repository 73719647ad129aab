//! Per-task fan-out of stream events to realtime connections.

use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::{ConnectionId, ServerMessage, StreamEvent};

struct Connection {
    sender: mpsc::Sender<ServerMessage>,
    subscriptions: HashSet<Uuid>,
}

/// Registry of live connections and their task subscriptions.
///
/// Constructed once at service start and shared by `Arc`. Delivery never
/// awaits a peer: each connection has a bounded outbound queue, and a
/// connection whose queue is full or closed is removed on the spot.
pub struct StreamManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    channel_capacity: usize,
}

impl StreamManager {
    /// Manager whose per-connection queues hold `channel_capacity` messages.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Open a connection and return its outbound message stream.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.add_connection(id, tx).await;
        (id, rx)
    }

    /// Register a connection with an externally created channel.
    ///
    /// The `connected` greeting is queued immediately.
    pub async fn add_connection(&self, id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        let greeting = ServerMessage::Connected { connection_id: id };
        if sender.try_send(greeting).is_err() {
            warn!(connection_id = %id, "connection closed before greeting");
            return;
        }

        let mut connections = self.connections.write().await;
        connections.insert(
            id,
            Connection {
                sender,
                subscriptions: HashSet::new(),
            },
        );
        info!(connection_id = %id, connections = connections.len(), "realtime connection added");
    }

    /// Drop a connection and all of its subscriptions. Unknown ids are ignored.
    pub async fn remove_connection(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if connections.remove(&id).is_some() {
            info!(connection_id = %id, connections = connections.len(), "realtime connection removed");
        }
    }

    /// Returns false when the connection is unknown.
    pub async fn subscribe(&self, id: ConnectionId, task_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&id) {
            Some(conn) => {
                conn.subscriptions.insert(task_id);
                debug!(connection_id = %id, task_id = %task_id, "subscribed");
                true
            }
            None => false,
        }
    }

    /// Stop delivering a task's events to a connection. Returns whether it was subscribed.
    pub async fn unsubscribe(&self, id: ConnectionId, task_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&id) {
            Some(conn) => {
                conn.subscriptions.remove(&task_id);
                debug!(connection_id = %id, task_id = %task_id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Deliver `event` to every connection subscribed to `task_id`.
    ///
    /// Returns the number of connections the event was queued for.
    pub async fn publish(&self, task_id: Uuid, event: &StreamEvent) -> usize {
        let mut connections = self.connections.write().await;
        let message = ServerMessage::event(event.clone());

        let mut delivered = 0;
        let mut broken = Vec::new();
        for (id, conn) in connections.iter() {
            if !conn.subscriptions.contains(&task_id) {
                continue;
            }
            match conn.sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(connection_id = %id, task_id = %task_id, "subscriber too slow, dropping connection");
                    broken.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %id, "subscriber channel closed");
                    broken.push(*id);
                }
            }
        }

        for id in broken {
            connections.remove(&id);
        }
        delivered
    }

    /// Queue a message for one connection. Returns false when it is gone or full.
    pub async fn send_to(&self, id: ConnectionId, message: ServerMessage) -> bool {
        self.connections
            .read()
            .await
            .get(&id)
            .is_some_and(|conn| conn.sender.try_send(message).is_ok())
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Task ids a connection is subscribed to, or `None` for an unknown connection.
    pub async fn subscriptions(&self, id: ConnectionId) -> Option<HashSet<Uuid>> {
        self.connections
            .read()
            .await
            .get(&id)
            .map(|c| c.subscriptions.clone())
    }

    /// Remove every connection; their receivers observe end of stream.
    pub async fn close_all(&self) {
        let mut connections = self.connections.write().await;
        let count = connections.len();
        connections.clear();
        if count > 0 {
            info!(connections = count, "closed all realtime connections");
        }
    }
}
