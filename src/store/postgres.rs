//! # Postgres Store
//!
//! Counts and streams directory records with queries rendered from the compiled filter,
//! and persists order status with conditional updates.
//!
//! Streaming runs the cursor on a spawned task that forwards rows through a bounded
//! channel, so at most `buffer` rows are held ahead of the chunk writer regardless of
//! result size.

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{OrderStore, RecordStore, RecordStream};
use crate::config::FulfillmentConfig;
use crate::error::{FulfillmentError, Result};
use crate::filter::CompiledFilter;
use crate::models::{NewOrder, Order, Record, User};
use crate::query_builder::RecordQuery;
use crate::state_machine::OrderStatus;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const ORDER_COLUMNS: &str = "order_id, user_id, email, user_name, filters, total_count, \
                             add_ons, price_cents, payment_ref, status, error, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &FulfillmentConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| FulfillmentError::Database(format!("Migration failed: {e}")))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn count_distinct(&self, filter: &CompiledFilter) -> Result<u64> {
        let Some(predicate) = filter.predicate() else {
            return Ok(0);
        };

        let mut query = RecordQuery::count_distinct(predicate);
        let count: i64 = query.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn stream_distinct(
        &self,
        filter: &CompiledFilter,
        buffer: usize,
    ) -> Result<RecordStream> {
        let Some(predicate) = filter.predicate().cloned() else {
            return Ok(Box::pin(futures::stream::empty()));
        };

        let (tx, rx) = mpsc::channel::<Result<Record>>(buffer.max(1));
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let mut query = RecordQuery::select_distinct(&predicate);
            let mut rows = query.build_query_as::<Record>().fetch(&pool);
            let mut forwarded: u64 = 0;

            while let Some(row) = rows.next().await {
                let row = row.map_err(FulfillmentError::from);
                let failed = row.is_err();
                if tx.send(row).await.is_err() {
                    debug!(forwarded, "Record consumer dropped; closing cursor");
                    return;
                }
                if failed {
                    warn!(forwarded, "Record cursor failed mid-stream");
                    return;
                }
                forwarded += 1;
            }
            debug!(forwarded, "Record cursor exhausted");
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|row| (row, rx))
        })))
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let order = Order::from_new(new_order);
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {ORDER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(order.order_id)
            .bind(order.user_id)
            .bind(&order.email)
            .bind(&order.user_name)
            .bind(Json(&order.filters))
            .bind(order.total_count)
            .bind(&order.add_ons)
            .bind(order.price_cents)
            .bind(&order.payment_ref)
            .bind(order.status.as_str())
            .bind(&order.error)
            .bind(order.created_at)
            .bind(order.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status = $3, error = COALESCE($4, error), updated_at = NOW() \
             WHERE order_id = $1 AND status = $2",
        )
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(FulfillmentError::NotFound(format!(
                "Order {order_id} not found"
            ))),
            Some(current) => Err(FulfillmentError::InvalidTransition {
                from: current,
                to: to.to_string(),
            }),
        }
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT user_id, email, name FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
