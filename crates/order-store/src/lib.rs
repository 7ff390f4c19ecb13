//! Persistence for orders.
//!
//! [`OrderRepository`] is the capability the ingestion workers and order
//! lookups depend on. [`PostgresOrderStore`] writes every order through one
//! [`OrderUnitOfWork`] so the five tables commit together or not at all, and
//! [`CachedOrderStore`] puts a read-through cache in front of any repository.

pub mod cached;
pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;
pub mod unit_of_work;

pub use cached::CachedOrderStore;
pub use common::OrderId;
pub use config::PostgresConfig;
pub use error::{Result, StoreError};
pub use memory::{CreateStep, InMemoryOrderStore, RowCounts};
pub use postgres::{DEFAULT_SHUTDOWN_GRACE, PostgresOrderStore};
pub use service::OrderService;
pub use store::OrderRepository;
pub use unit_of_work::OrderUnitOfWork;
