use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::OrderId;
use domain::{Delivery, Item, Order, Payment};
use tokio::sync::RwLock;

use crate::{OrderRepository, Result, StoreError};

/// A stage of [`InMemoryOrderStore::create`], in the order the rows are
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateStep {
    Items,
    Payment,
    Delivery,
    Order,
    Links,
    Commit,
}

impl CreateStep {
    fn op(self) -> &'static str {
        match self {
            CreateStep::Items => "order_store.memory.create.insert_item",
            CreateStep::Payment => "order_store.memory.create.insert_payment",
            CreateStep::Delivery => "order_store.memory.create.insert_delivery",
            CreateStep::Order => "order_store.memory.create.insert_order",
            CreateStep::Links => "order_store.memory.create.link_item",
            CreateStep::Commit => "order_store.memory.create.commit",
        }
    }
}

/// Number of rows in each table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub orders: usize,
    pub items: usize,
    pub payments: usize,
    pub deliveries: usize,
    pub order_items: usize,
}

impl RowCounts {
    pub fn is_empty(&self) -> bool {
        *self == RowCounts::default()
    }
}

struct OrderRow {
    order: Order,
    payment_id: i64,
    delivery_id: i64,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    orders: BTreeMap<i64, OrderRow>,
    items: HashMap<i64, Item>,
    payments: HashMap<i64, Payment>,
    deliveries: HashMap<i64, Delivery>,
    order_items: Vec<(i64, i64, usize)>,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory order store for testing.
///
/// Mirrors the relational layout of the PostgreSQL store: every create stages
/// its rows and only publishes them on commit, so an injected failure at any
/// [`CreateStep`] leaves no rows behind.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<HashMap<CreateStep, usize>>>,
    create_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` creates fail at `step` with a retryable error.
    pub async fn fail_creates_at(&self, step: CreateStep, times: usize) {
        self.faults.write().await.insert(step, times);
    }

    /// Number of `create` calls received, including failed ones.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_by_id` calls received.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub async fn row_counts(&self) -> RowCounts {
        let tables = self.tables.read().await;
        RowCounts {
            orders: tables.orders.len(),
            items: tables.items.len(),
            payments: tables.payments.len(),
            deliveries: tables.deliveries.len(),
            order_items: tables.order_items.len(),
        }
    }

    /// Looks up the id of a stored order by its natural key.
    pub async fn id_of(&self, order_uid: &str) -> Option<OrderId> {
        self.tables
            .read()
            .await
            .orders
            .iter()
            .find(|(_, row)| row.order.order_uid == order_uid)
            .map(|(id, _)| OrderId::new(*id))
    }

    /// Clears all rows and pending faults.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
        self.faults.write().await.clear();
    }

    async fn check(&self, step: CreateStep) -> Result<()> {
        let mut faults = self.faults.write().await;
        if let Some(remaining) = faults.get_mut(&step)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StoreError::Unavailable {
                op: step.op(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn fetch_by_id(&self, id: OrderId) -> Result<Order> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let tables = self.tables.read().await;
        let row = tables
            .orders
            .get(&id.as_i64())
            .ok_or(StoreError::NotFound(id))?;

        let delivery = tables
            .deliveries
            .get(&row.delivery_id)
            .ok_or(StoreError::NotFound(id))?;
        let payment = tables
            .payments
            .get(&row.payment_id)
            .ok_or(StoreError::NotFound(id))?;

        let mut links: Vec<_> = tables
            .order_items
            .iter()
            .filter(|(order_id, _, _)| *order_id == id.as_i64())
            .collect();
        links.sort_by_key(|(_, _, position)| *position);

        let items = links
            .into_iter()
            .map(|(_, item_id, _)| tables.items.get(item_id).cloned().ok_or(StoreError::NotFound(id)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Order {
            delivery: delivery.clone(),
            payment: payment.clone(),
            items,
            ..row.order.clone()
        })
    }

    async fn create(&self, order: &Order) -> Result<OrderId> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        // Holding the write lock for the whole call serializes creates the
        // way the unique constraint does in PostgreSQL.
        let mut tables = self.tables.write().await;

        self.check(CreateStep::Items).await?;
        let item_ids: Vec<i64> = order.items.iter().map(|_| tables.allocate()).collect();

        self.check(CreateStep::Payment).await?;
        let payment_id = tables.allocate();

        self.check(CreateStep::Delivery).await?;
        let delivery_id = tables.allocate();

        self.check(CreateStep::Order).await?;
        if tables
            .orders
            .values()
            .any(|row| row.order.order_uid == order.order_uid)
        {
            return Err(StoreError::Duplicate {
                order_uid: order.order_uid.clone(),
            });
        }
        let order_id = tables.allocate();

        self.check(CreateStep::Links).await?;
        self.check(CreateStep::Commit).await?;

        for (position, (item_id, item)) in item_ids.iter().zip(&order.items).enumerate() {
            tables.items.insert(*item_id, item.clone());
            tables.order_items.push((order_id, *item_id, position));
        }
        tables.payments.insert(payment_id, order.payment.clone());
        tables.deliveries.insert(delivery_id, order.delivery.clone());
        tables.orders.insert(
            order_id,
            OrderRow {
                order: Order {
                    items: Vec::new(),
                    ..order.clone()
                },
                payment_id,
                delivery_id,
            },
        );

        Ok(OrderId::new(order_id))
    }
}
