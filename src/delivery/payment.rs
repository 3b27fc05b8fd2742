//! # Payment Collaborator
//!
//! Refund by payment reference on failure, and a payment-status check used when an
//! order is submitted. [`StripeClient`] talks to the Stripe REST API.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::PaymentConfig;
use crate::error::{FulfillmentError, Result};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Refund the full captured amount of a payment
    async fn refund(&self, payment_ref: &str) -> Result<()>;

    /// Whether the payment reports as captured
    async fn payment_succeeded(&self, payment_ref: &str) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Refund {
    id: String,
    status: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: Url,
    secret_key: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl StripeClient {
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        let api_base = Url::parse(&config.api_base).map_err(|e| {
            FulfillmentError::Configuration(format!("Invalid payment API base URL: {e}"))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                FulfillmentError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_base,
            secret_key: config.secret_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| FulfillmentError::Payment(format!("Invalid payment endpoint {path}: {e}")))
    }

    /// Payment references are opaque Stripe ids; anything that could change the
    /// request path is rejected before it reaches the URL.
    fn payment_intent_url(&self, payment_ref: &str) -> Result<Url> {
        let well_formed = !payment_ref.is_empty()
            && payment_ref
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !well_formed {
            return Err(FulfillmentError::Validation(format!(
                "Malformed payment reference: {payment_ref:?}"
            )));
        }
        self.endpoint(&format!("/v1/payment_intents/{payment_ref}"))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn refund(&self, payment_ref: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("/v1/refunds")?)
            .bearer_auth(&self.secret_key)
            .form(&[("payment_intent", payment_ref)])
            .send()
            .await
            .map_err(|e| FulfillmentError::Payment(format!("Refund request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FulfillmentError::Payment(format!(
                "Refund for {payment_ref} rejected with {status}: {detail}"
            )));
        }

        let refund: Refund = response
            .json()
            .await
            .map_err(|e| FulfillmentError::Payment(format!("Unreadable refund response: {e}")))?;
        info!(
            payment_ref,
            refund_id = %refund.id,
            refund_status = refund.status.as_deref().unwrap_or("unknown"),
            "Refund issued"
        );
        Ok(())
    }

    async fn payment_succeeded(&self, payment_ref: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.payment_intent_url(payment_ref)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| FulfillmentError::Payment(format!("Payment lookup failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FulfillmentError::Payment(format!(
                "Payment lookup for {payment_ref} failed with {status}"
            )));
        }
        if !status.is_success() {
            warn!(payment_ref, %status, "Payment lookup rejected");
            return Ok(false);
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| FulfillmentError::Payment(format!("Unreadable payment response: {e}")))?;
        Ok(intent.status == "succeeded")
    }
}
