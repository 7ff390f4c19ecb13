use common::PartitionId;
use order_store::StoreError;
use thiserror::Error;

/// Errors reported by a message broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Unknown partition {partition} of topic {topic}")]
    UnknownPartition {
        topic: String,
        partition: PartitionId,
    },

    /// The partition already has an open consumer.
    #[error("Partition {0} is already being consumed")]
    AlreadyOpen(PartitionId),

    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// An error delivered on a partition's error stream.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors produced while ingesting a topic.
///
/// Only [`IngestError::ListPartitions`] aborts the pipeline. Everything else
/// is recorded against its partition and surfaced once all workers have
/// exited.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The partitions of the topic could not be resolved.
    #[error("Failed to list partitions of topic {topic}: {source}")]
    ListPartitions {
        topic: String,
        #[source]
        source: BrokerError,
    },

    #[error("Failed to open partition {partition}: {source}")]
    OpenPartition {
        partition: PartitionId,
        #[source]
        source: BrokerError,
    },

    #[error("Transport error on partition {partition}: {source}")]
    Transport {
        partition: PartitionId,
        #[source]
        source: BrokerError,
    },

    /// An order could not be stored after every retry.
    #[error("Failed to persist order {order_uid} (partition {partition}, offset {offset}): {source}")]
    Persist {
        partition: PartitionId,
        offset: i64,
        order_uid: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to close partition {partition}: {source}")]
    ClosePartition {
        partition: PartitionId,
        #[source]
        source: BrokerError,
    },

    #[error("Worker for partition {partition} panicked: {message}")]
    WorkerPanicked {
        partition: PartitionId,
        message: String,
    },

    /// Ingestion stopped because cancellation was requested.
    #[error("Ingestion cancelled")]
    Cancelled,

    /// One or more partitions reported errors.
    #[error("{} partition error(s): {}", .0.len(), join_errors(.0))]
    Partitions(Vec<IngestError>),
}

impl IngestError {
    /// Returns true if ingestion ended only because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IngestError::Cancelled)
    }

    /// Returns true if the error stopped the pipeline before any partition
    /// was consumed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::ListPartitions { .. })
    }

    /// Returns the partition the error belongs to, if any.
    pub fn partition(&self) -> Option<PartitionId> {
        match self {
            IngestError::OpenPartition { partition, .. }
            | IngestError::Transport { partition, .. }
            | IngestError::Persist { partition, .. }
            | IngestError::ClosePartition { partition, .. }
            | IngestError::WorkerPanicked { partition, .. } => Some(*partition),
            IngestError::ListPartitions { .. }
            | IngestError::Cancelled
            | IngestError::Partitions(_) => None,
        }
    }

    /// Flattens a combined error into its parts.
    pub fn into_parts(self) -> Vec<IngestError> {
        match self {
            IngestError::Partitions(errors) => errors,
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[IngestError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
