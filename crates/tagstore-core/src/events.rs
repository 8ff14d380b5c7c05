//! Event bus for domain events
//!
//! Domain code fires named events with a JSON payload and a [`Context`] for
//! causal attribution. [`BroadcastBus`] fans them out to any number of
//! receivers over a tokio broadcast channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Who or what caused an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

impl Context {
    /// Create a fresh context with no user or parent
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            parent_id: None,
        }
    }

    /// Create a fresh context attributed to `user_id`
    pub fn with_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::new()
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// A fired event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub data: Value,
    pub context: Context,
    pub time_fired: DateTime<Utc>,
}

/// Sink for domain events
pub trait EventBus: Send + Sync {
    fn fire(&self, event_type: &str, data: Value, context: Context);
}

/// Event bus broadcasting to all current receivers
pub struct BroadcastBus {
    sender: broadcast::Sender<Event>,
}

impl BroadcastBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events fired from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for BroadcastBus {
    fn fire(&self, event_type: &str, data: Value, context: Context) {
        trace!("Firing {} ({} receiver(s))", event_type, self.receiver_count());
        let event = Event {
            event_type: event_type.to_string(),
            data,
            context,
            time_fired: Utc::now(),
        };
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fire_reaches_subscribers() {
        let bus = BroadcastBus::default();
        let mut rx = bus.subscribe();
        let context = Context::with_user("admin");

        bus.fire("something_happened", json!({"a": 1}), context.clone());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, "something_happened");
        assert_eq!(event.data, json!({"a": 1}));
        assert_eq!(event.context, context);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fire_without_receivers_is_ok() {
        let bus = BroadcastBus::new(4);
        bus.fire("nobody_listens", Value::Null, Context::new());

        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
