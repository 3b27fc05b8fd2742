//! # Data Store Seams
//!
//! The pipeline reads the directory dataset through [`RecordStore`] and persists order
//! status through [`OrderStore`]. Postgres backs both in production; the in-memory store
//! backs tests and local runs.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;
use crate::filter::CompiledFilter;
use crate::models::{NewOrder, Order, Record, User};
use crate::state_machine::OrderStatus;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Lazily produced records, already de-duplicated by record identity
pub type RecordStream = BoxStream<'static, Result<Record>>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Number of distinct records matching the filter; zero for an empty filter
    async fn count_distinct(&self, filter: &CompiledFilter) -> Result<u64>;

    /// Stream each distinct matching record exactly once.
    ///
    /// `buffer` bounds how many rows may be fetched ahead of the consumer. An empty
    /// filter yields an empty stream without touching the backend.
    async fn stream_distinct(&self, filter: &CompiledFilter, buffer: usize)
        -> Result<RecordStream>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>>;

    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Move an order from `from` to `to`, recording `error` when given.
    ///
    /// Fails with `InvalidTransition` when the stored status is no longer `from`, and
    /// with `NotFound` when the order does not exist.
    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        error: Option<&str>,
    ) -> Result<()>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;
}
