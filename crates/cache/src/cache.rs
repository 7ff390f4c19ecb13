use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

/// Byte-oriented key-value cache with per-entry expiry.
///
/// Implementations must be safe to share between tasks without external
/// locking.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the stored bytes, or `None` if the key is absent or expired.
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, expiring after `ttl`.
    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Releases the backend connection. Closing twice is not an error;
    /// backends that hold a connection answer later calls with
    /// [`CacheError::Closed`](crate::CacheError::Closed).
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Typed JSON access on top of any [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    /// Reads and deserializes a value. A payload that no longer matches `T`
    /// is a `Serialization` error, distinct from a miss.
    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores a value.
    async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set_raw(key, bytes, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}
