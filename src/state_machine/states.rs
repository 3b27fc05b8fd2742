use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FulfillmentError;

/// Order status as persisted on the order record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Initial state; the fulfillment run owns the order
    Processing,
    /// Every part was packaged and delivered
    Completed,
    /// Reconciliation, export, packaging or delivery failed; a refund was requested
    Failed,
    /// Add-on columns requested; staff deliver the data manually
    PendingDelivery,
}

impl OrderStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Transitions only ever leave `processing`
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        matches!(self, Self::Processing) && target.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::PendingDelivery => "pending_delivery",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = FulfillmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "pending_delivery" => Ok(Self::PendingDelivery),
            _ => Err(FulfillmentError::Validation(format!(
                "Invalid order status: {s}"
            ))),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = FulfillmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Default state for new orders
impl Default for OrderStatus {
    fn default() -> Self {
        Self::Processing
    }
}
