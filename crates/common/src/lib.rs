//! Identifier types shared by every crate in the ingestion pipeline.

mod types;

pub use types::{OrderId, PartitionId};
