use serde::{Deserialize, Serialize};

use super::states::OrderStatus;

/// Events that can trigger order status transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Every part was delivered
    Complete,
    /// The run failed with a human-readable reason
    Fail(String),
    /// Delivery handed over to staff for add-on preparation
    DeferDelivery,
}

impl OrderEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::DeferDelivery => "defer_delivery",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn target_status(&self) -> OrderStatus {
        match self {
            Self::Complete => OrderStatus::Completed,
            Self::Fail(_) => OrderStatus::Failed,
            Self::DeferDelivery => OrderStatus::PendingDelivery,
        }
    }
}
