//! Realtime wire messages exchanged with subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stream_event::StreamEvent;

/// Identifier of a realtime connection.
pub type ConnectionId = Uuid;

/// Messages pushed from the server to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting carrying the id assigned to the connection.
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },
    /// A task event for a subscribed task.
    #[serde(rename_all = "camelCase")]
    Event {
        task_id: Uuid,
        timestamp: DateTime<Utc>,
        data: StreamEvent,
    },
    /// A client frame could not be handled.
    Error { message: String },
}

impl ServerMessage {
    /// Wrap a stream event for delivery.
    pub fn event(event: StreamEvent) -> Self {
        Self::Event {
            task_id: event.task_id,
            timestamp: event.timestamp,
            data: event,
        }
    }
}

/// Control messages received from a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving a task's events.
    #[serde(rename_all = "camelCase")]
    Subscribe { task_id: Uuid },
    /// Stop receiving a task's events.
    #[serde(rename_all = "camelCase")]
    Unsubscribe { task_id: Uuid },
}
