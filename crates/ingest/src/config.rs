//! Ingestion settings loaded from environment variables.

use std::time::Duration;

use crate::{RetryPolicy, StartOffset};

/// Ingestion configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `INGEST_TOPIC`: topic to consume (default: `"orders"`)
/// - `INGEST_MAX_RETRIES`: retries after a failed persist (default: `3`)
/// - `INGEST_INITIAL_BACKOFF_MS`: first retry delay (default: `100`)
/// - `INGEST_ERROR_CHANNEL_CAPACITY`: shared error channel size (default: `10`)
/// - `INGEST_START_OFFSET`: `newest`, `oldest` or an offset (default: `newest`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub topic: String,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub error_channel_capacity: usize,
    pub start_offset: StartOffset,
}

impl IngestConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            topic: lookup("INGEST_TOPIC")
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.topic),
            max_retries: lookup("INGEST_MAX_RETRIES")
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(defaults.max_retries),
            initial_backoff: lookup("INGEST_INITIAL_BACKOFF_MS")
                .and_then(|ms| ms.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            error_channel_capacity: lookup("INGEST_ERROR_CHANNEL_CAPACITY")
                .and_then(|n| n.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.error_channel_capacity),
            start_offset: lookup("INGEST_START_OFFSET")
                .and_then(|s| match s.parse() {
                    Ok(offset) => Some(offset),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring INGEST_START_OFFSET");
                        None
                    }
                })
                .unwrap_or(defaults.start_offset),
        }
    }

    /// Returns the retry policy for persisting orders.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.initial_backoff)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            topic: "orders".to_string(),
            max_retries: retry.max_retries,
            initial_backoff: retry.initial_backoff,
            error_channel_capacity: 10,
            start_offset: StartOffset::Newest,
        }
    }
}
