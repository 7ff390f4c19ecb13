//! Cache layer for the order ingestion pipeline.
//!
//! The cache is never the system of record. Every failure mode degrades to a
//! miss from the caller's perspective; see [`ReadThrough`].

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod read_through;
pub mod redis_backend;

pub use cache::{Cache, CacheExt};
pub use config::RedisConfig;
pub use error::{CacheError, Result};
pub use memory::InMemoryCache;
pub use read_through::ReadThrough;
pub use redis_backend::RedisCache;
