use std::sync::Arc;
use uuid::Uuid;

use super::{events::OrderEvent, states::OrderStatus};
use crate::error::{FulfillmentError, Result};
use crate::store::OrderStore;

/// Status lifecycle for one order, persisted through the order store.
///
/// The store applies each transition conditionally on the status it expects to leave,
/// so a terminal order is never resurrected even by a stale caller.
pub struct OrderStateMachine {
    order_id: Uuid,
    current: OrderStatus,
    store: Arc<dyn OrderStore>,
}

impl OrderStateMachine {
    pub fn new(order_id: Uuid, current: OrderStatus, store: Arc<dyn OrderStore>) -> Self {
        Self {
            order_id,
            current,
            store,
        }
    }

    pub fn current_state(&self) -> OrderStatus {
        self.current
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    /// Attempt to transition the order status
    pub async fn transition(&mut self, event: OrderEvent) -> Result<OrderStatus> {
        let target = Self::determine_target_state(self.current, &event)?;

        self.store
            .transition_status(self.order_id, self.current, target, event.error_message())
            .await?;

        tracing::debug!(
            order_id = %self.order_id,
            from = %self.current,
            to = %target,
            event = event.event_type(),
            "Order status transitioned"
        );

        self.current = target;
        Ok(target)
    }

    fn determine_target_state(current: OrderStatus, event: &OrderEvent) -> Result<OrderStatus> {
        let target = event.target_status();
        if current.can_transition_to(target) {
            Ok(target)
        } else {
            Err(FulfillmentError::InvalidTransition {
                from: current.to_string(),
                to: target.to_string(),
            })
        }
    }
}
