//! Runtime event system: lets observers follow an agent without hooking it.
//!
//! The runtime publishes an event at every lifecycle milestone and every
//! claim transition. Consumers subscribe and filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::model::EntityId;

/// Everything an observer can learn about a running agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuntimeEvent {
    /// The platform accepted the registration
    Registered {
        agent_id: EntityId,
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// The stream is open
    Connected { timestamp: DateTime<Utc> },

    /// The platform confirmed `agent:join`
    Joined { timestamp: DateTime<Utc> },

    /// A claim request left this process
    ClaimAttempted {
        task_id: EntityId,
        timestamp: DateTime<Utc>,
    },

    /// A claim was rolled back to unclaimed
    ClaimReverted {
        task_id: EntityId,
        timestamp: DateTime<Utc>,
    },

    /// The platform decided who owns a task
    TaskResolved {
        task_id: EntityId,
        mine: bool,
        timestamp: DateTime<Utc>,
    },

    /// This agent reported a task complete
    TaskCompleted {
        task_id: EntityId,
        timestamp: DateTime<Utc>,
    },

    /// A topic handler returned an error; dispatch continued
    HandlerFailed {
        topic: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The stream ended
    StreamClosed {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Teardown finished
    Stopped { timestamp: DateTime<Utc> },
}

impl RuntimeEvent {
    pub fn registered(agent_id: EntityId, name: impl Into<String>) -> Self {
        Self::Registered {
            agent_id,
            name: name.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn claim_attempted(task_id: EntityId) -> Self {
        Self::ClaimAttempted {
            task_id,
            timestamp: Utc::now(),
        }
    }

    pub fn claim_reverted(task_id: EntityId) -> Self {
        Self::ClaimReverted {
            task_id,
            timestamp: Utc::now(),
        }
    }

    pub fn task_resolved(task_id: EntityId, mine: bool) -> Self {
        Self::TaskResolved {
            task_id,
            mine,
            timestamp: Utc::now(),
        }
    }

    pub fn task_completed(task_id: EntityId) -> Self {
        Self::TaskCompleted {
            task_id,
            timestamp: Utc::now(),
        }
    }

    pub fn handler_failed(topic: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::HandlerFailed {
            topic: topic.into(),
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn stream_closed(reason: impl std::fmt::Display) -> Self {
        Self::StreamClosed {
            reason: reason.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// A broadcast-based event bus for runtime events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<RuntimeEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: RuntimeEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RuntimeEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(RuntimeEvent::task_resolved(42, true));

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            RuntimeEvent::TaskResolved { task_id, mine, .. } => {
                assert_eq!(*task_id, 42);
                assert!(mine);
            }
            _ => panic!("Expected TaskResolved event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(RuntimeEvent::handler_failed("task:created", "boom"));
    }
}
