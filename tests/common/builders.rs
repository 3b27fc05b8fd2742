//! Builders for orders, records and run configuration used across integration tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fulfillment_core::config::FulfillmentConfig;
use fulfillment_core::delivery::{Mailer, PaymentGateway};
use fulfillment_core::models::{FilterSpec, NewOrder, Order, Record, User};
use fulfillment_core::orchestration::FulfillmentOrchestrator;
use fulfillment_core::store::{InMemoryStore, OrderStore, RecordStore};
use uuid::Uuid;

pub const CUSTOMER_EMAIL: &str = "buyer@example.com";
pub const STAFF_EMAIL: &str = "staff@example.com";

/// Defaults with every temp file under `temp_root`
pub fn test_config(temp_root: &Path) -> FulfillmentConfig {
    let mut config = FulfillmentConfig::default();
    config.export.temp_dir = temp_root.to_path_buf();
    config.delivery.staff_email = STAFF_EMAIL.to_string();
    config.worker.workers = 2;
    config.worker.queue_capacity = 16;
    config.worker.run_deadline_secs = 30;
    config.worker.shutdown_timeout_secs = 5;
    config
}

pub fn category_filter(category: &str) -> FilterSpec {
    FilterSpec {
        categories: vec![category.to_string()],
        ..FilterSpec::default()
    }
}

/// Fixed-width record so every encoded row has the same length
pub fn restaurant(index: usize) -> Record {
    Record {
        record_id: Uuid::new_v4(),
        business_name: format!("Business {index:08}"),
        country: Some("Canada".to_string()),
        state: Some("Ontario".to_string()),
        city: Some("Toronto".to_string()),
        address: Some(format!("{:06} Queen Street", index % 1_000_000)),
        phone: Some(format!("555-{:07}", index % 10_000_000)),
        category: "Restaurants".to_string(),
        subcategory: Some("Pizza".to_string()),
        categories: Some("Delivery, Takeout".to_string()),
        attributes: None,
    }
}

pub fn restaurants(count: usize) -> Vec<Record> {
    (0..count).map(restaurant).collect()
}

pub struct OrderBuilder {
    new_order: NewOrder,
}

impl OrderBuilder {
    pub fn new(promised: i64) -> Self {
        Self {
            new_order: NewOrder {
                user_id: Uuid::new_v4(),
                email: CUSTOMER_EMAIL.to_string(),
                user_name: Some("Dana".to_string()),
                filters: category_filter("restaurants"),
                total_count: promised,
                add_ons: Vec::new(),
                price_cents: promised,
                payment_ref: format!("pi_{}", Uuid::new_v4().simple()),
            },
        }
    }

    pub fn filters(mut self, filters: FilterSpec) -> Self {
        self.new_order.filters = filters;
        self
    }

    pub fn add_ons(mut self, add_ons: &[&str]) -> Self {
        self.new_order.add_ons = add_ons.iter().map(|a| (*a).to_string()).collect();
        self
    }

    pub fn build(self) -> Order {
        Order::from_new(self.new_order)
    }

    /// Build and persist in `store`
    pub fn insert(self, store: &InMemoryStore) -> Order {
        let order = self.build();
        store.insert_order(order.clone());
        order
    }
}

pub fn customer(store: &InMemoryStore) -> User {
    let user = User {
        user_id: Uuid::new_v4(),
        email: CUSTOMER_EMAIL.to_string(),
        name: Some("Dana".to_string()),
    };
    store.insert_user(user.clone());
    user
}

pub fn orchestrator(
    config: FulfillmentConfig,
    records: Arc<dyn RecordStore>,
    orders: Arc<dyn OrderStore>,
    mailer: Arc<dyn Mailer>,
    payments: Arc<dyn PaymentGateway>,
) -> Arc<FulfillmentOrchestrator> {
    Arc::new(FulfillmentOrchestrator::new(
        Arc::new(config),
        records,
        orders,
        mailer,
        payments,
    ))
}

/// Poll until `check` holds or the timeout elapses
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = tokio::time::Instant::now();
    while started.elapsed() < timeout {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Regular files left anywhere under `root`
pub fn files_under(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                files_under(&path)
            } else {
                1
            }
        })
        .sum()
}
