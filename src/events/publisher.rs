use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Broadcast publisher for order lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub order_id: Uuid,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event for one order.
    ///
    /// Having no subscribers is not an error; lagging subscribers lose the oldest events.
    pub fn publish(&self, event_name: impl Into<String>, order_id: Uuid, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            order_id,
            context,
            published_at: chrono::Utc::now(),
        };

        if self.sender.send(event).is_err() {
            tracing::trace!(order_id = %order_id, "No lifecycle event subscribers");
        }
    }

    /// Publish with a single `details` string as context
    pub fn publish_details(&self, event_name: &str, order_id: Uuid, details: &str) {
        self.publish(event_name, order_id, json!({ "details": details }));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = EventPublisher::new(8);
        let mut receiver = publisher.subscribe();
        let order_id = Uuid::new_v4();

        publisher.publish_details("fulfillment.started", order_id, "250 records");

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, "fulfillment.started");
        assert_eq!(event.order_id, order_id);
        assert_eq!(event.context["details"], "250 records");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = EventPublisher::default();
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish("fulfillment.failed", Uuid::new_v4(), Value::Null);
    }
}
