use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::{OrderStore, RecordStore, RecordStream};
use crate::error::{FulfillmentError, Result};
use crate::filter::CompiledFilter;
use crate::models::{NewOrder, Order, Record, User};
use crate::state_machine::OrderStatus;

/// Process-local store evaluating compiled filters directly against records.
///
/// Duplicate record ids are allowed on insert so callers can model a dataset that
/// repeats rows; reads keep the first occurrence. Streams read from a snapshot taken
/// when they are opened and yield matches one at a time.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Arc<Vec<Record>>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        store.insert_records(records);
        store
    }

    pub fn insert_records(&self, records: impl IntoIterator<Item = Record>) {
        Arc::make_mut(&mut *self.records.write()).extend(records);
    }

    pub fn insert_user(&self, user: User) {
        self.users.write().insert(user.user_id, user);
    }

    /// Store an order as-is, bypassing submission
    pub fn insert_order(&self, order: Order) {
        self.orders.write().insert(order.order_id, order);
    }

    pub fn order(&self, order_id: Uuid) -> Option<Order> {
        self.orders.read().get(&order_id).cloned()
    }

    fn distinct_match_count(&self, filter: &CompiledFilter) -> usize {
        let records = self.records.read();
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|record| filter.matches(record))
            .filter(|record| seen.insert(record.record_id))
            .count()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn count_distinct(&self, filter: &CompiledFilter) -> Result<u64> {
        if filter.is_empty() {
            return Ok(0);
        }
        Ok(self.distinct_match_count(filter) as u64)
    }

    async fn stream_distinct(
        &self,
        filter: &CompiledFilter,
        _buffer: usize,
    ) -> Result<RecordStream> {
        if filter.is_empty() {
            return Ok(Box::pin(futures::stream::empty()));
        }
        let records = Arc::clone(&*self.records.read());
        let filter = filter.clone();
        let mut seen = HashSet::new();
        let stream = futures::stream::iter(0..records.len()).filter_map(move |index| {
            let record = &records[index];
            let next = (filter.matches(record) && seen.insert(record.record_id))
                .then(|| Ok(record.clone()));
            futures::future::ready(next)
        });
        Ok(stream.boxed())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let order = Order::from_new(new_order);
        self.orders.write().insert(order.order_id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        Ok(self.order(order_id))
    }

    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|order| order.status == status)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }

    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| FulfillmentError::NotFound(format!("Order {order_id} not found")))?;

        if order.status != from {
            return Err(FulfillmentError::InvalidTransition {
                from: order.status.to_string(),
                to: to.to_string(),
            });
        }

        order.status = to;
        if let Some(error) = error {
            order.error = Some(error.to_string());
        }
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterCompiler;
    use crate::models::FilterSpec;
    use futures::TryStreamExt;

    fn record(id: Uuid, category: &str) -> Record {
        Record {
            record_id: id,
            business_name: format!("{category} business"),
            country: None,
            state: None,
            city: None,
            address: None,
            phone: None,
            category: category.to_string(),
            subcategory: None,
            categories: None,
            attributes: None,
        }
    }

    fn new_order() -> NewOrder {
        NewOrder {
            user_id: Uuid::new_v4(),
            email: "buyer@example.com".to_string(),
            user_name: Some("Buyer".to_string()),
            filters: FilterSpec::default(),
            total_count: 10,
            add_ons: vec![],
            price_cents: 10,
            payment_ref: "pi_1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_ids_counted_and_streamed_once() {
        let shared = Uuid::new_v4();
        let store = InMemoryStore::with_records(vec![
            record(shared, "Bars"),
            record(shared, "Bars"),
            record(Uuid::new_v4(), "Bars"),
            record(Uuid::new_v4(), "Cafes"),
        ]);
        let filter = FilterCompiler::compile(&FilterSpec {
            categories: vec!["bars".to_string()],
            ..FilterSpec::default()
        });

        assert_eq!(store.count_distinct(&filter).await.unwrap(), 2);
        let streamed: Vec<Record> = store
            .stream_distinct(&filter, 8)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(streamed.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_reads_snapshot_lazily() {
        let first = Uuid::new_v4();
        let store = InMemoryStore::with_records(vec![
            record(first, "Bars"),
            record(Uuid::new_v4(), "Cafes"),
            record(first, "Bars"),
            record(Uuid::new_v4(), "Bars"),
        ]);
        let filter = FilterCompiler::compile(&FilterSpec {
            categories: vec!["Bars".to_string()],
            ..FilterSpec::default()
        });

        let mut stream = store.stream_distinct(&filter, 1).await.unwrap();
        let head = stream.next().await.unwrap().unwrap();
        assert_eq!(head.record_id, first);

        // Records added after the stream opened are not part of this export
        store.insert_records(vec![record(Uuid::new_v4(), "Bars")]);
        let rest: Vec<Record> = stream.try_collect().await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_ne!(rest[0].record_id, first);
        assert_eq!(store.count_distinct(&filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_filter_reads_nothing() {
        let store = InMemoryStore::with_records(vec![record(Uuid::new_v4(), "Bars")]);
        let filter = CompiledFilter::match_nothing();
        assert_eq!(store.count_distinct(&filter).await.unwrap(), 0);
        let streamed: Vec<Record> = store
            .stream_distinct(&filter, 8)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(streamed.is_empty());
    }

    #[tokio::test]
    async fn test_transition_is_conditional_on_current_status() {
        let store = InMemoryStore::new();
        let order = store.create_order(new_order()).await.unwrap();

        store
            .transition_status(
                order.order_id,
                OrderStatus::Processing,
                OrderStatus::Failed,
                Some("boom"),
            )
            .await
            .unwrap();

        let err = store
            .transition_status(
                order.order_id,
                OrderStatus::Processing,
                OrderStatus::Completed,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidTransition { .. }));

        let stored = store.order(order.order_id).unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .transition_status(
                Uuid::new_v4(),
                OrderStatus::Processing,
                OrderStatus::Completed,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound(_)));
    }
}
