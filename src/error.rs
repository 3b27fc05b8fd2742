//! # Fulfillment Errors
//!
//! Structured error handling for the fulfillment pipeline. Every error belongs to one
//! [`ErrorCategory`], which decides how the failure is explained to the customer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FulfillmentError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No filters provided to fetch records.")]
    EmptyFilter,
    #[error(
        "Mismatch between validated count ({actual}) and expected count ({expected}). A refund will be issued."
    )]
    CountMismatch {
        expected: u64,
        actual: u64,
        tolerance: u64,
    },
    #[error("Export error: {0}")]
    Export(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Archive {} exceeds the {limit_bytes} byte limit: {size_bytes} bytes", path.display())]
    ArchiveTooLarge {
        path: PathBuf,
        size_bytes: u64,
        limit_bytes: u64,
    },
    #[error("Failed to deliver part {part} of {total_parts}: {message}")]
    Delivery {
        part: usize,
        total_parts: usize,
        message: String,
    },
    #[error("Mail error: {0}")]
    Mail(String),
    #[error("Payment error: {0}")]
    Payment(String),
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Fulfillment run exceeded its deadline of {seconds}s")]
    DeadlineExceeded { seconds: u64 },
    #[error("Fulfillment run was cancelled")]
    Cancelled,
    #[error("Fulfillment queue is closed")]
    QueueClosed,
    #[error("Uncaught error in background task: {0}")]
    Uncaught(String),
}

/// Error taxonomy used to pick the failure notice and log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any pipeline work starts
    Validation,
    /// Live data no longer matches what was paid for
    Consistency,
    /// Data store, file system, archive size, deadline
    Resource,
    /// Message send failure
    Delivery,
}

impl FulfillmentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::NotFound(_) | Self::Configuration(_) => {
                ErrorCategory::Validation
            }
            Self::CountMismatch { .. } | Self::EmptyFilter => ErrorCategory::Consistency,
            Self::Delivery { .. } | Self::Mail(_) => ErrorCategory::Delivery,
            Self::Database(_)
            | Self::Export(_)
            | Self::Io(_)
            | Self::ArchiveTooLarge { .. }
            | Self::Payment(_)
            | Self::InvalidTransition { .. }
            | Self::DeadlineExceeded { .. }
            | Self::Cancelled
            | Self::QueueClosed
            | Self::Uncaught(_) => ErrorCategory::Resource,
        }
    }
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(err: sqlx::Error) -> Self {
        FulfillmentError::Database(err.to_string())
    }
}

impl From<std::io::Error> for FulfillmentError {
    fn from(err: std::io::Error) -> Self {
        FulfillmentError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FulfillmentError {
    fn from(err: serde_json::Error) -> Self {
        FulfillmentError::Validation(format!("JSON serialization error: {err}"))
    }
}

impl From<csv::Error> for FulfillmentError {
    fn from(err: csv::Error) -> Self {
        FulfillmentError::Export(format!("CSV encoding error: {err}"))
    }
}

impl From<config::ConfigError> for FulfillmentError {
    fn from(err: config::ConfigError) -> Self {
        FulfillmentError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;
