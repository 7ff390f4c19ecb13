//! Domain layer for the order ingestion pipeline.
//!
//! This crate provides:
//! - The `Order` aggregate with its `Payment`, `Delivery` and `Item` parts,
//!   matching the JSON shape published on the order topic
//! - `OrderValidator`, which reports every violated field constraint at once
//! - `OrderSummary`, a flat projection used by listing surfaces

pub mod error;
pub mod order;
pub mod validation;

pub use error::{FieldViolation, Rule, ValidationError};
pub use order::{Delivery, Item, Order, OrderSummary, Payment};
pub use validation::OrderValidator;
