#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dataset Fulfillment Core
//!
//! Order fulfillment and bulk export pipeline for a business-directory dataset
//! marketplace.
//!
//! ## Overview
//!
//! After a purchase is confirmed, an order's filter is compiled into one predicate, the
//! promised record count is re-validated against live data, matching records are streamed
//! into size-bounded CSV chunks, each chunk is gzip-compressed, and the archives are
//! emailed as "part K of N". Any failure marks the order `failed`, refunds the payment
//! and notifies the customer. Orders with add-on columns are handed to staff instead.
//!
//! ## Module Organization
//!
//! - [`filter`] - Filter compiler producing a normalized predicate
//! - [`query_builder`] - Predicate tree, SQL rendering and in-process evaluation
//! - [`store`] - Record and order access (Postgres and in-memory)
//! - [`export`] - Streaming exporter, chunk writer, packager, scoped workspace
//! - [`delivery`] - Mail and payment collaborators, templates, part-by-part delivery
//! - [`orchestration`] - Reconciler, orchestrator, worker pool, submission, pricing
//! - [`state_machine`] - Order status lifecycle
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`events`] - Lifecycle event broadcast
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fulfillment_core::config::FulfillmentConfig;
//! use fulfillment_core::delivery::{HttpMailer, StripeClient};
//! use fulfillment_core::orchestration::{FulfillmentOrchestrator, FulfillmentWorkerPool};
//! use fulfillment_core::store::PgStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(FulfillmentConfig::load(None)?);
//! let store = Arc::new(PgStore::connect(&config).await?);
//! let orchestrator = Arc::new(FulfillmentOrchestrator::new(
//!     Arc::clone(&config),
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(HttpMailer::new(&config.delivery)?),
//!     Arc::new(StripeClient::new(&config.payment)?),
//! ));
//! let pool = FulfillmentWorkerPool::start(orchestrator, store.clone(), &config.worker);
//! pool.recover_stalled(store.as_ref()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod delivery;
pub mod error;
pub mod events;
pub mod export;
pub mod filter;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod query_builder;
pub mod state_machine;
pub mod store;

pub use crate::config::FulfillmentConfig;
pub use error::{ErrorCategory, FulfillmentError, Result};
pub use filter::{CompiledFilter, FilterCompiler};
pub use models::{FilterSpec, NewOrder, Order, Record, User};
pub use orchestration::{
    FulfillmentOrchestrator, FulfillmentOutcome, FulfillmentWorkerPool, OrderSubmission,
};
pub use state_machine::OrderStatus;
