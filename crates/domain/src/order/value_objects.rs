//! Value objects owned by an order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment attached to an order. Amounts are integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    /// ISO 4217 three-letter code.
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix timestamp in seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
}

impl Payment {
    /// Returns the payment time, or `None` if the timestamp is out of range.
    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.payment_dt, 0)
    }
}

/// Delivery address and contact for an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    /// E.164 phone number, e.g. `+97200000000`.
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// A line item of an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// External catalog id.
    pub chrt_id: i64,
    pub price: i64,
    pub rid: String,
    pub name: String,
    /// Sale percentage, 0-100.
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
}
