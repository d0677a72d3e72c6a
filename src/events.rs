//! Thin lifecycle event bus (L5).
//!
//! The engine publishes lifecycle events as it runs workflows; observers
//! (dashboards, loggers, external schedulers) subscribe independently.
//! Publication is fire-and-forget: a subscriber that lags or panics never
//! blocks or fails workflow progress, matching `axon::coordination::message_bus`'s
//! broadcast-channel shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Lifecycle event types emitted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    StepStarted,
    StepCompleted,
    StepRetrying,
    StepTimeout,
    AgentRegistered,
    AgentUnregistered,
}

/// A single lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            source: source.into(),
            data,
        }
    }
}

/// Non-blocking publish/subscribe bus for lifecycle events.
///
/// Backed by a `tokio::sync::broadcast` channel: publishing never awaits a
/// subscriber and never fails workflow progress if there are no
/// subscribers or a subscriber is lagging (lagged receivers simply skip
/// ahead, they are not disconnected).
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event. Never blocks; a send with no subscribers is a no-op.
    pub fn publish(&self, event: Event) {
        debug!(event_type = ?event.event_type, source = %event.source, "publishing event");
        // A send error just means there are currently no subscribers.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
