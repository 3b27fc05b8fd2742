//! # Fulfillment Orchestration
//!
//! Count reconciliation, the per-order orchestrator, the supervising worker pool, order
//! submission and pricing.

pub mod orchestrator;
pub mod pricing;
pub mod reconciler;
pub mod submission;
pub mod worker_pool;

pub use orchestrator::{CancelHandle, CancelSignal, FulfillmentOrchestrator, FulfillmentOutcome};
pub use pricing::{price_matches, quote_price_cents};
pub use reconciler::{CountReconciler, ReconciliationReport};
pub use submission::{OrderSubmission, SubmissionReceipt, SubmitOrderRequest};
pub use worker_pool::FulfillmentWorkerPool;
