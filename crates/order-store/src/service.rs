//! Order service providing a simplified API for order operations.

use common::OrderId;
use domain::{Order, OrderSummary, OrderValidator};

use crate::{OrderRepository, Result};

/// Service for storing and looking up orders.
///
/// Validates orders before they reach the repository, so a rejected order
/// never opens a transaction.
pub struct OrderService<R: OrderRepository> {
    repository: R,
    validator: OrderValidator,
}

impl<R: OrderRepository> OrderService<R> {
    /// Creates a new order service on top of the given repository.
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            validator: OrderValidator::new(),
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Validates and stores an order.
    #[tracing::instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn create_order(&self, order: &Order) -> Result<OrderId> {
        self.validator.validate(order)?;
        self.repository.create(order).await
    }

    /// Gets an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.repository.fetch_by_id(id).await
    }

    /// Gets the flat summary view of an order.
    pub async fn get_summary(&self, id: OrderId) -> Result<OrderSummary> {
        let order = self.get_order(id).await?;
        Ok(OrderSummary::from(&order))
    }
}
