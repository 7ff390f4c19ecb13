use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::OrderId;
use domain::{Delivery, Item, Order, Payment};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};

use crate::error::DbResultExt;
use crate::{OrderRepository, OrderUnitOfWork, PostgresConfig, Result, StoreError};

/// How long `close` waits for acquired connections to come back.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool from configuration and verifies it with a ping.
    ///
    /// A failure here is fatal to the pipeline.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await
            .map_err(StoreError::Connect)?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(StoreError::Connect)?;

        tracing::info!(host = %config.host, database = %config.database, "connected to postgres");
        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Closes the pool, waiting at most `grace` for acquired connections to
    /// be returned, and reports how many were still held when it gave up.
    /// A non-zero count is logged but is not an error.
    pub async fn shutdown(&self, grace: Duration) -> u32 {
        if tokio::time::timeout(grace, self.pool.close()).await.is_err() {
            tracing::debug!(?grace, "postgres pool close timed out");
        }

        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        let acquired = self.pool.size().saturating_sub(idle);
        if acquired > 0 {
            tracing::warn!(acquired, "postgres connections not fully released after close");
        } else {
            tracing::info!("postgres pool closed");
        }
        acquired
    }

    async fn load_order(conn: &mut PgConnection, id: OrderId) -> Result<Order> {
        let header = sqlx::query(
            r#"
            SELECT order_uid, track_number, entry, internal_signature, payment_id, delivery_id,
                   locale, customer_id, delivery_service, shardkey, sm_id
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await
        .op("order_store.postgres.fetch.order")?
        .ok_or(StoreError::NotFound(id))?;

        let payment_id: i64 = header.try_get("payment_id").op("order_store.postgres.fetch.order")?;
        let delivery_id: i64 = header.try_get("delivery_id").op("order_store.postgres.fetch.order")?;

        let delivery = sqlx::query(
            "SELECT name, phone, zip, city, address, region, email FROM delivery WHERE id = $1",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *conn)
        .await
        .op("order_store.postgres.fetch.delivery")?
        .ok_or(StoreError::NotFound(id))?;

        let payment = sqlx::query(
            r#"
            SELECT transaction_id, currency, provider, amount, payment_dt, bank, delivery_cost, goods_total
            FROM payment
            WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *conn)
        .await
        .op("order_store.postgres.fetch.payment")?
        .ok_or(StoreError::NotFound(id))?;

        let item_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT item_id FROM order_items WHERE order_id = $1 ORDER BY position ASC",
        )
        .bind(id.as_i64())
        .fetch_all(&mut *conn)
        .await
        .op("order_store.postgres.fetch.item_ids")?;

        let mut items = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let row = sqlx::query(
                r#"
                SELECT chrt_id, price, rid, name, sale, size, total_price, nm_id, brand
                FROM items
                WHERE id = $1
                "#,
            )
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await
            .op("order_store.postgres.fetch.item")?
            .ok_or(StoreError::NotFound(id))?;
            items.push(Self::row_to_item(&row).op("order_store.postgres.fetch.item")?);
        }

        Self::rows_to_order(&header, &delivery, &payment, items)
            .op("order_store.postgres.fetch.decode")
    }

    fn rows_to_order(
        header: &PgRow,
        delivery: &PgRow,
        payment: &PgRow,
        items: Vec<Item>,
    ) -> std::result::Result<Order, sqlx::Error> {
        Ok(Order {
            order_uid: header.try_get("order_uid")?,
            track_number: header.try_get("track_number")?,
            entry: header.try_get("entry")?,
            delivery: Delivery {
                name: delivery.try_get("name")?,
                phone: delivery.try_get("phone")?,
                zip: delivery.try_get("zip")?,
                city: delivery.try_get("city")?,
                address: delivery.try_get("address")?,
                region: delivery.try_get("region")?,
                email: delivery.try_get("email")?,
            },
            payment: Payment {
                transaction: payment.try_get("transaction_id")?,
                currency: payment.try_get("currency")?,
                provider: payment.try_get("provider")?,
                amount: payment.try_get("amount")?,
                payment_dt: payment.try_get("payment_dt")?,
                bank: payment.try_get("bank")?,
                delivery_cost: payment.try_get("delivery_cost")?,
                goods_total: payment.try_get("goods_total")?,
            },
            items,
            locale: header.try_get("locale")?,
            internal_signature: header.try_get("internal_signature")?,
            customer_id: header.try_get("customer_id")?,
            delivery_service: header.try_get("delivery_service")?,
            shardkey: header.try_get("shardkey")?,
            sm_id: header.try_get("sm_id")?,
        })
    }

    fn row_to_item(row: &PgRow) -> std::result::Result<Item, sqlx::Error> {
        Ok(Item {
            chrt_id: row.try_get("chrt_id")?,
            price: row.try_get("price")?,
            rid: row.try_get("rid")?,
            name: row.try_get("name")?,
            sale: row.try_get("sale")?,
            size: row.try_get("size")?,
            total_price: row.try_get("total_price")?,
            nm_id: row.try_get("nm_id")?,
            brand: row.try_get("brand")?,
        })
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderStore {
    #[tracing::instrument(skip(self))]
    async fn fetch_by_id(&self, id: OrderId) -> Result<Order> {
        let mut tx = self
            .pool
            .begin()
            .await
            .op("order_store.postgres.fetch.begin")?;

        let order = Self::load_order(&mut tx, id).await?;

        tx.commit().await.op("order_store.postgres.fetch.commit")?;
        Ok(order)
    }

    #[tracing::instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn create(&self, order: &Order) -> Result<OrderId> {
        let started = Instant::now();

        let mut uow = OrderUnitOfWork::begin(&self.pool).await?;
        let id = uow.stage_order(order).await?;
        uow.commit().await?;

        metrics::counter!("order_store_orders_created_total").increment(1);
        metrics::histogram!("order_store_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(order_id = %id, items = order.items.len(), "order stored");
        Ok(id)
    }

    async fn close(&self) {
        self.shutdown(DEFAULT_SHUTDOWN_GRACE).await;
    }
}
