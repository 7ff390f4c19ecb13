//! Multi-partition order ingestion.
//!
//! An [`IngestCoordinator`] lists the partitions of a topic through a
//! [`Broker`], runs one [`PartitionWorker`] per partition and joins them.
//! Each worker decodes and validates its messages and persists orders
//! through an [`order_store::OrderRepository`], retrying transient failures
//! with the backoff of a [`RetryPolicy`].

pub mod broker;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod retry;
pub mod worker;

#[cfg(test)]
mod testing;

pub use broker::{Broker, Message, PartitionConsumer, StartOffset};
pub use config::IngestConfig;
pub use coordinator::{IngestCoordinator, IngestSummary};
pub use error::{BrokerError, IngestError, Result};
pub use memory::{InMemoryBroker, PartitionWriter};
pub use retry::RetryPolicy;
pub use worker::{FailedMessage, PartitionReport, PartitionWorker, WorkerExit, WorkerState};
