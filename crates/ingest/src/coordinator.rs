//! Fan-out of partition workers over one topic.

use std::collections::HashMap;
use std::sync::Arc;

use common::PartitionId;
use order_store::OrderRepository;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{Broker, IngestConfig, IngestError, PartitionReport, PartitionWorker, Result};

/// Aggregated outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// One report per worker that ran, ordered by partition.
    pub reports: Vec<PartitionReport>,
    /// Partitions that could not be opened, and workers that panicked.
    pub errors: Vec<IngestError>,
    /// Transport errors forwarded by workers while they ran.
    pub forwarded: Vec<IngestError>,
    /// Whether the run ended because cancellation was requested.
    pub cancelled: bool,
}

impl IngestSummary {
    /// Total orders persisted across partitions.
    pub fn persisted(&self) -> u64 {
        self.reports.iter().map(|r| r.persisted).sum()
    }

    /// Returns the report for one partition.
    pub fn report(&self, partition: PartitionId) -> Option<&PartitionReport> {
        self.reports.iter().find(|r| r.partition == partition)
    }

    /// Returns true if any partition recorded an error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.reports.iter().any(PartitionReport::has_errors)
    }

    /// Converts the summary into the run's result.
    ///
    /// Recorded errors take precedence and are combined into
    /// [`IngestError::Partitions`]; otherwise a cancelled run is
    /// [`IngestError::Cancelled`]. The summary is returned only for a run
    /// that ended cleanly.
    pub fn into_result(mut self) -> Result<IngestSummary> {
        let mut errors = std::mem::take(&mut self.errors);
        for report in &mut self.reports {
            errors.extend(report.take_errors());
        }

        if !errors.is_empty() {
            return Err(IngestError::Partitions(errors));
        }
        if self.cancelled {
            return Err(IngestError::Cancelled);
        }
        Ok(self)
    }
}

/// Discovers the partitions of a topic, runs one [`PartitionWorker`] per
/// partition and aggregates their reports.
pub struct IngestCoordinator<B, R> {
    broker: B,
    store: Arc<R>,
    config: IngestConfig,
}

impl<B, R> IngestCoordinator<B, R>
where
    B: Broker,
    R: OrderRepository + 'static,
{
    pub fn new(broker: B, store: Arc<R>, config: IngestConfig) -> Self {
        Self {
            broker,
            store,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Consumes the topic until every worker has exited.
    ///
    /// Returns the combined partition errors if any were recorded,
    /// [`IngestError::Cancelled`] if the run ended through `cancel`, and the
    /// summary otherwise.
    pub async fn consume(&self, cancel: CancellationToken) -> Result<IngestSummary> {
        self.run(cancel).await?.into_result()
    }

    /// Consumes the topic and returns the full summary, including partition
    /// errors. Fails only if the partitions cannot be listed.
    #[tracing::instrument(skip(self, cancel), fields(topic = %self.config.topic))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<IngestSummary> {
        let topic = self.config.topic.as_str();
        let partitions = self
            .broker
            .partitions(topic)
            .await
            .map_err(|source| IngestError::ListPartitions {
                topic: topic.to_string(),
                source,
            })?;
        tracing::info!(partitions = partitions.len(), "starting ingestion");

        let mut summary = IngestSummary::default();
        let (errors_tx, mut errors_rx) = mpsc::channel(self.config.error_channel_capacity.max(1));
        let mut workers = JoinSet::new();
        let mut spawned = HashMap::new();

        for partition in partitions {
            let consumer = match self
                .broker
                .open_partition(topic, partition, self.config.start_offset)
                .await
            {
                Ok(consumer) => consumer,
                Err(source) => {
                    tracing::error!(%partition, error = %source, "failed to open partition");
                    summary.errors.push(IngestError::OpenPartition { partition, source });
                    continue;
                }
            };

            let worker = PartitionWorker::new(
                consumer,
                self.store.clone(),
                self.config.retry_policy(),
                errors_tx.clone(),
                cancel.clone(),
            );
            let handle = workers.spawn(worker.run());
            spawned.insert(handle.id(), partition);
            tracing::info!(%partition, offset = %self.config.start_offset, "partition opened");
        }
        drop(errors_tx);

        loop {
            tokio::select! {
                Some(error) = errors_rx.recv() => {
                    tracing::warn!(error = %error, "transport error forwarded by worker");
                    summary.forwarded.push(error);
                }
                joined = workers.join_next_with_id() => match joined {
                    Some(Ok((_, report))) => summary.reports.push(report),
                    Some(Err(e)) => match spawned.get(&e.id()) {
                        Some(&partition) => {
                            tracing::error!(%partition, error = %e, "partition worker panicked");
                            summary.errors.push(IngestError::WorkerPanicked {
                                partition,
                                message: e.to_string(),
                            });
                        }
                        None => tracing::error!(error = %e, "unknown worker task failed"),
                    },
                    None => break,
                },
            }
        }
        while let Ok(error) = errors_rx.try_recv() {
            summary.forwarded.push(error);
        }

        summary.reports.sort_by_key(|r| r.partition);
        summary.cancelled = cancel.is_cancelled();
        tracing::info!(
            persisted = summary.persisted(),
            cancelled = summary.cancelled,
            has_errors = summary.has_errors(),
            "ingestion finished"
        );
        Ok(summary)
    }
}
