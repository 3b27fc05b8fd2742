//! # Order Submission
//!
//! Validates a confirmed purchase, persists it as a `processing` order and queues it for
//! fulfillment. Everything that can be rejected is rejected here, before any pipeline
//! work; the caller gets a receipt immediately and all outcomes arrive by email.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::pricing::{price_matches, quote_price_cents};
use super::worker_pool::FulfillmentWorkerPool;
use crate::config::FulfillmentConfig;
use crate::delivery::{delivery_estimate_days, PaymentGateway};
use crate::error::{FulfillmentError, Result};
use crate::models::{FilterSpec, NewOrder};
use crate::store::OrderStore;

/// Purchase confirmation as sent by the storefront
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub payment_intent_id: String,
    pub filters: FilterSpec,
    pub total_count: i64,
    pub total_price_cents: i64,
    #[serde(default)]
    pub selected_addons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub order_id: Uuid,
    pub message: String,
    /// Present when add-ons defer delivery to staff
    pub delivery_days: Option<u64>,
}

pub struct OrderSubmission {
    config: Arc<FulfillmentConfig>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentGateway>,
    pool: Arc<FulfillmentWorkerPool>,
}

impl OrderSubmission {
    pub fn new(
        config: Arc<FulfillmentConfig>,
        orders: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentGateway>,
        pool: Arc<FulfillmentWorkerPool>,
    ) -> Self {
        Self {
            config,
            orders,
            payments,
            pool,
        }
    }

    #[instrument(skip(self, request), fields(payment_ref = %request.payment_intent_id))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        request: SubmitOrderRequest,
    ) -> Result<SubmissionReceipt> {
        let payment_ref = request.payment_intent_id.trim().to_string();
        if payment_ref.is_empty() {
            return Err(FulfillmentError::Validation(
                "Payment reference is required".to_string(),
            ));
        }
        if request.total_count <= 0 {
            return Err(FulfillmentError::Validation(format!(
                "Record count must be positive, got {}",
                request.total_count
            )));
        }

        let add_ons: Vec<String> = request
            .selected_addons
            .iter()
            .map(|add_on| add_on.trim().to_string())
            .filter(|add_on| !add_on.is_empty())
            .collect();

        let pricing = &self.config.pricing;
        let quoted = quote_price_cents(request.total_count as u64, add_ons.len(), pricing);
        if !price_matches(quoted, request.total_price_cents, pricing) {
            warn!(
                quoted,
                submitted = request.total_price_cents,
                "Submitted price does not match quote"
            );
            return Err(FulfillmentError::Validation(format!(
                "Price mismatch: expected {quoted} cents, received {} cents",
                request.total_price_cents
            )));
        }

        if !self.payments.payment_succeeded(&payment_ref).await? {
            return Err(FulfillmentError::Validation(
                "Payment has not succeeded".to_string(),
            ));
        }

        let user = self
            .orders
            .find_user(user_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound(format!("User {user_id} not found")))?;

        let order = self
            .orders
            .create_order(NewOrder {
                user_id,
                email: user.email,
                user_name: user.name,
                filters: request.filters,
                total_count: request.total_count,
                add_ons,
                price_cents: request.total_price_cents,
                payment_ref,
            })
            .await?;

        info!(order_id = %order.order_id, records = order.total_count, "Order accepted");

        // The order is durable in `processing`; a closed queue only delays it until recovery
        if let Err(e) = self.pool.submit(order.order_id).await {
            error!(order_id = %order.order_id, error = %e, "Failed to queue order");
        }

        let (message, delivery_days) = if order.requires_manual_delivery() {
            let days = delivery_estimate_days(
                order.promised_count(),
                self.config.delivery.records_per_delivery_day,
            );
            (
                format!(
                    "Payment successful, you will receive a confirmation email shortly. \
                     Your data will be delivered within {days} day(s)."
                ),
                Some(days),
            )
        } else {
            (
                "Payment successful, the CSV file(s) will be sent to your email shortly."
                    .to_string(),
                None,
            )
        };

        Ok(SubmissionReceipt {
            order_id: order.order_id,
            message,
            delivery_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_storefront_json() {
        let request: SubmitOrderRequest = serde_json::from_value(serde_json::json!({
            "paymentIntentId": "pi_123",
            "filters": { "categories": ["Bars"] },
            "totalCount": 250,
            "totalPriceCents": 250
        }))
        .unwrap();
        assert!(request.selected_addons.is_empty());
        assert_eq!(request.filters.categories, vec!["Bars"]);
    }
}
