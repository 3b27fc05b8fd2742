//! # Fulfillment Configuration
//!
//! Every limit the pipeline enforces lives here and is passed into the orchestrator at
//! construction, so tests can drive boundary values deterministically.
//!
//! Sources are layered in order: built-in defaults, an optional TOML file, then
//! `FULFILLMENT__SECTION__KEY` environment variables.

use crate::error::{FulfillmentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub export: ExportConfig,
    pub reconciliation: ReconciliationConfig,
    pub worker: WorkerConfig,
    pub delivery: DeliveryConfig,
    pub payment: PaymentConfig,
    pub pricing: PricingConfig,
}

/// Chunking, packaging and temp-file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Soft upper bound for one CSV chunk, header included
    pub max_chunk_bytes: u64,
    /// Hard upper bound for one compressed archive
    pub max_archive_bytes: u64,
    /// Root under which each run gets its own scoped directory
    pub temp_dir: PathBuf,
    /// Joins array-valued cells; must differ from the field delimiter
    pub array_delimiter: String,
    /// Rows buffered between the data-store cursor and the chunk writer
    pub stream_buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Largest accepted |promised - live| difference
    pub count_tolerance: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub run_deadline_secs: u64,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub staff_email: String,
    pub from_address: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub records_per_delivery_day: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub api_base: String,
    pub secret_key: String,
}

/// Tiered pricing; all rates are integers to keep money arithmetic exact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub tier_threshold: u64,
    pub first_tier_rate_cents: u64,
    /// Thousandths of a cent per record beyond the threshold
    pub second_tier_rate_millicents: u64,
    pub addon_rate_cents: u64,
    pub price_tolerance_cents: i64,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/dataset_fulfillment_development".to_string(),
            database_max_connections: 10,
            export: ExportConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            worker: WorkerConfig::default(),
            delivery: DeliveryConfig::default(),
            payment: PaymentConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: 18 * MIB,
            max_archive_bytes: 18 * MIB,
            temp_dir: std::env::temp_dir().join("dataset-fulfillment"),
            array_delimiter: ";".to_string(),
            stream_buffer: 1024,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            count_tolerance: 100,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            run_deadline_secs: 3600,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            staff_email: "admin@example.com".to_string(),
            from_address: "orders@example.com".to_string(),
            mail_api_url: "http://localhost:8025/api/send".to_string(),
            mail_api_key: String::new(),
            records_per_delivery_day: 1000,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".to_string(),
            secret_key: String::new(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tier_threshold: 100_000,
            first_tier_rate_cents: 1,
            second_tier_rate_millicents: 500,
            addon_rate_cents: 1,
            price_tolerance_cents: 1,
        }
    }
}

impl WorkerConfig {
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl FulfillmentConfig {
    /// Layer defaults, an optional TOML file and `FULFILLMENT__*` environment variables.
    ///
    /// A plain `DATABASE_URL` overrides every other source for the connection string.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&FulfillmentConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let loaded: FulfillmentConfig = builder
            .add_source(
                config::Environment::with_prefix("FULFILLMENT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database_url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(FulfillmentError::Configuration(msg.to_string()));

        if self.export.max_chunk_bytes == 0 {
            return invalid("export.max_chunk_bytes must be greater than zero");
        }
        if self.export.max_archive_bytes == 0 {
            return invalid("export.max_archive_bytes must be greater than zero");
        }
        if self.export.stream_buffer == 0 {
            return invalid("export.stream_buffer must be greater than zero");
        }
        if self.export.array_delimiter.is_empty() || self.export.array_delimiter == "," {
            return invalid("export.array_delimiter must be non-empty and differ from ','");
        }
        if self.worker.workers == 0 {
            return invalid("worker.workers must be greater than zero");
        }
        if self.worker.queue_capacity == 0 {
            return invalid("worker.queue_capacity must be greater than zero");
        }
        if self.worker.run_deadline_secs == 0 {
            return invalid("worker.run_deadline_secs must be greater than zero");
        }
        if self.delivery.records_per_delivery_day == 0 {
            return invalid("delivery.records_per_delivery_day must be greater than zero");
        }
        Ok(())
    }
}
