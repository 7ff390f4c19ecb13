//! Transactional write of one order across the normalized tables.

use common::OrderId;
use domain::{Delivery, Item, Order, Payment};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{DbResultExt, ORDER_UID_CONSTRAINT};
use crate::{Result, StoreError};

/// One write transaction covering every row of an order.
///
/// The transaction is owned by this value. Dropping it without calling
/// [`commit`](Self::commit), including on an early `?` return from any
/// step, rolls every staged row back.
pub struct OrderUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl OrderUnitOfWork {
    /// Starts a write transaction on the pool.
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let tx = pool.begin().await.op("order_store.postgres.create.begin")?;
        Ok(Self { tx })
    }

    /// Stages all rows of `order` in referential order: items, payment,
    /// delivery, the order header, then one association row per item.
    pub async fn stage_order(&mut self, order: &Order) -> Result<OrderId> {
        let mut item_ids = Vec::with_capacity(order.items.len());
        for item in &order.items {
            item_ids.push(self.insert_item(item).await?);
        }

        let payment_id = self.insert_payment(&order.payment).await?;
        let delivery_id = self.insert_delivery(&order.delivery).await?;
        let order_id = self.insert_order(order, payment_id, delivery_id).await?;

        for (position, item_id) in item_ids.into_iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| StoreError::Unavailable {
                op: "order_store.postgres.create.link_item",
                reason: "too many items in one order".to_string(),
            })?;
            self.link_item(order_id, item_id, position).await?;
        }

        Ok(order_id)
    }

    pub async fn insert_item(&mut self, item: &Item) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO items (chrt_id, price, rid, name, sale, size, total_price, nm_id, brand)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(item.chrt_id)
        .bind(item.price)
        .bind(&item.rid)
        .bind(&item.name)
        .bind(item.sale)
        .bind(&item.size)
        .bind(item.total_price)
        .bind(item.nm_id)
        .bind(&item.brand)
        .fetch_one(&mut *self.tx)
        .await
        .op("order_store.postgres.create.insert_item")
    }

    pub async fn insert_payment(&mut self, payment: &Payment) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payment (transaction_id, currency, provider, amount, payment_dt, bank, delivery_cost, goods_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&payment.transaction)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .fetch_one(&mut *self.tx)
        .await
        .op("order_store.postgres.create.insert_payment")
    }

    pub async fn insert_delivery(&mut self, delivery: &Delivery) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO delivery (name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .fetch_one(&mut *self.tx)
        .await
        .op("order_store.postgres.create.insert_delivery")
    }

    pub async fn insert_order(
        &mut self,
        order: &Order,
        payment_id: i64,
        delivery_id: i64,
    ) -> Result<OrderId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO orders (order_uid, track_number, entry, internal_signature, payment_id, delivery_id,
                                locale, customer_id, delivery_service, shardkey, sm_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.internal_signature)
        .bind(payment_id)
        .bind(delivery_id)
        .bind(&order.locale)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(ORDER_UID_CONSTRAINT)
            {
                return StoreError::Duplicate {
                    order_uid: order.order_uid.clone(),
                };
            }
            StoreError::database("order_store.postgres.create.insert_order", e)
        })?;

        Ok(OrderId::new(id))
    }

    pub async fn link_item(&mut self, order_id: OrderId, item_id: i64, position: i32) -> Result<()> {
        sqlx::query("INSERT INTO order_items (order_id, item_id, position) VALUES ($1, $2, $3)")
            .bind(order_id.as_i64())
            .bind(item_id)
            .bind(position)
            .execute(&mut *self.tx)
            .await
            .op("order_store.postgres.create.link_item")?;
        Ok(())
    }

    /// Commits every staged row.
    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .op("order_store.postgres.create.commit")
    }
}
