//! The order aggregate root.

use serde::{Deserialize, Serialize};

use super::value_objects::{Delivery, Item, Payment};
use crate::{OrderValidator, ValidationError};

/// An order as published on the order topic and stored across the
/// `orders`, `payment`, `delivery`, `items` and `order_items` tables.
///
/// Every field defaults when its key is missing from the payload, so a
/// record with gaps decodes successfully and the validator reports each
/// missing field instead of the decoder failing on the first one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// External unique identifier; natural key for deduplication.
    pub order_uid: String,
    pub track_number: String,
    /// Entry channel tag.
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
}

impl Order {
    /// Decodes an order from a JSON message payload.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encodes the order as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Validates the order with the default rule set.
    pub fn validate(&self) -> Result<(), ValidationError> {
        OrderValidator::new().validate(self)
    }

    /// Sum of every item's total price.
    pub fn items_total(&self) -> i64 {
        self.items.iter().map(|item| item.total_price).sum()
    }

    /// Returns the number of items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
