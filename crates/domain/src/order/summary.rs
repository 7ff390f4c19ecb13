use serde::{Deserialize, Serialize};

use super::Order;

/// Flat view of an order for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_uid: String,
    pub entry: String,
    pub total_price: i64,
    pub customer_id: String,
    pub track_number: String,
    pub delivery_service: String,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            order_uid: order.order_uid.clone(),
            entry: order.entry.clone(),
            total_price: order.items_total(),
            customer_id: order.customer_id.clone(),
            track_number: order.track_number.clone(),
            delivery_service: order.delivery_service.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Item;

    #[test]
    fn test_summary_totals_items() {
        let order = Order {
            order_uid: "uid-1".to_string(),
            entry: "WBIL".to_string(),
            customer_id: "cust".to_string(),
            items: vec![
                Item {
                    total_price: 300,
                    ..Default::default()
                },
                Item {
                    total_price: 45,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let summary = OrderSummary::from(&order);
        assert_eq!(summary.order_uid, "uid-1");
        assert_eq!(summary.total_price, 345);
    }
}
