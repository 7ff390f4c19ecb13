//! Order aggregate and its value objects.

mod aggregate;
mod summary;
mod value_objects;

pub use aggregate::Order;
pub use summary::OrderSummary;
pub use value_objects::{Delivery, Item, Payment};
