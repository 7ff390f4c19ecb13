//! Capability interface over a partitioned message broker.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use common::PartitionId;
use tokio::sync::mpsc;

use crate::BrokerError;

/// A message read from one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub partition: PartitionId,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Where a newly opened partition starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartOffset {
    /// The oldest retained message.
    Oldest,
    /// Only messages produced after the partition is opened.
    #[default]
    Newest,
    /// An explicit offset.
    At(i64),
}

impl FromStr for StartOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest" => Ok(StartOffset::Oldest),
            "newest" => Ok(StartOffset::Newest),
            other => other
                .parse()
                .map(StartOffset::At)
                .map_err(|_| format!("invalid start offset: {s}")),
        }
    }
}

impl fmt::Display for StartOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOffset::Oldest => write!(f, "oldest"),
            StartOffset::Newest => write!(f, "newest"),
            StartOffset::At(offset) => write!(f, "{offset}"),
        }
    }
}

type Closer = Box<dyn FnOnce() -> Result<(), BrokerError> + Send>;

/// Handle to one opened partition: its message stream, its error stream and
/// a one-shot close.
///
/// The message stream ending means the partition has no more messages. The
/// error stream ending carries no such meaning.
pub struct PartitionConsumer {
    partition: PartitionId,
    pub(crate) messages: mpsc::Receiver<Message>,
    pub(crate) errors: mpsc::Receiver<BrokerError>,
    closer: Option<Closer>,
}

impl PartitionConsumer {
    pub fn new(
        partition: PartitionId,
        messages: mpsc::Receiver<Message>,
        errors: mpsc::Receiver<BrokerError>,
        close: impl FnOnce() -> Result<(), BrokerError> + Send + 'static,
    ) -> Self {
        Self {
            partition,
            messages,
            errors,
            closer: Some(Box::new(close)),
        }
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Returns true once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closer.is_none()
    }

    /// Releases the partition. Only the first call reaches the broker; later
    /// calls return `Ok(())`.
    pub fn close(&mut self) -> Result<(), BrokerError> {
        self.messages.close();
        self.errors.close();
        match self.closer.take() {
            Some(close) => close(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for PartitionConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionConsumer")
            .field("partition", &self.partition)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Core trait for broker clients.
///
/// Workers and the coordinator depend only on this capability, never on a
/// concrete client library.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Lists the partitions of a topic.
    async fn partitions(&self, topic: &str) -> Result<Vec<PartitionId>, BrokerError>;

    /// Opens one partition of a topic for consumption.
    async fn open_partition(
        &self,
        topic: &str,
        partition: PartitionId,
        offset: StartOffset,
    ) -> Result<PartitionConsumer, BrokerError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_parse_start_offset() {
        assert_eq!("newest".parse::<StartOffset>(), Ok(StartOffset::Newest));
        assert_eq!(" Oldest ".parse::<StartOffset>(), Ok(StartOffset::Oldest));
        assert_eq!("42".parse::<StartOffset>(), Ok(StartOffset::At(42)));
        assert!("latest".parse::<StartOffset>().is_err());
        assert_eq!(StartOffset::default(), StartOffset::Newest);
    }

    #[test]
    fn test_close_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_msg_tx, messages) = mpsc::channel(1);
        let (_err_tx, errors) = mpsc::channel(1);
        let counter = calls.clone();
        let mut consumer = PartitionConsumer::new(PartitionId::new(3), messages, errors, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(!consumer.is_closed());
        consumer.close().unwrap();
        consumer.close().unwrap();

        assert!(consumer.is_closed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(consumer.partition(), PartitionId::new(3));
    }
}
