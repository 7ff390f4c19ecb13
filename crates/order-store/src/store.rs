use async_trait::async_trait;
use common::OrderId;
use domain::Order;

use crate::Result;

/// Core trait for order store implementations.
///
/// Each call is one logical operation backed by exactly one transaction.
/// All implementations must be thread-safe (Send + Sync) because the pool
/// behind them is shared by every partition worker.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Loads a complete order.
    ///
    /// Returns `NotFound` if the order, its payment, its delivery, or any of
    /// its items is missing; a partial order is never returned.
    async fn fetch_by_id(&self, id: OrderId) -> Result<Order>;

    /// Stores an order with all of its parts atomically and returns the
    /// generated id.
    ///
    /// Returns `Duplicate` if an order with the same `order_uid` exists.
    async fn create(&self, order: &Order) -> Result<OrderId>;

    /// Releases the resources held by the store.
    async fn close(&self) {}
}

#[async_trait]
impl<R: OrderRepository + ?Sized> OrderRepository for std::sync::Arc<R> {
    async fn fetch_by_id(&self, id: OrderId) -> Result<Order> {
        (**self).fetch_by_id(id).await
    }

    async fn create(&self, order: &Order) -> Result<OrderId> {
        (**self).create(order).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
