//! Consumption of a single partition.

use std::sync::Arc;

use common::PartitionId;
use domain::{Order, OrderValidator};
use order_store::{OrderRepository, StoreError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{BrokerError, IngestError, Message, PartitionConsumer, RetryPolicy};

/// Where a worker is in its per-message cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Decoding,
    Validating,
    Persisting,
    Draining,
    Stopped,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The partition's message stream ended.
    ChannelClosed,
    /// Cancellation was requested.
    Cancelled,
}

/// A message whose order could not be stored after every attempt.
#[derive(Debug)]
pub struct FailedMessage {
    pub offset: i64,
    pub order_uid: String,
    pub attempts: u32,
    pub error: StoreError,
}

/// Outcome of one partition worker.
#[derive(Debug)]
pub struct PartitionReport {
    pub partition: PartitionId,
    pub persisted: u64,
    pub decode_skipped: u64,
    pub validation_skipped: u64,
    pub duplicates: u64,
    pub failed: Vec<FailedMessage>,
    /// Transport and close errors, in the order they happened.
    pub errors: Vec<IngestError>,
    pub exit: WorkerExit,
}

impl PartitionReport {
    fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            persisted: 0,
            decode_skipped: 0,
            validation_skipped: 0,
            duplicates: 0,
            failed: Vec::new(),
            errors: Vec::new(),
            exit: WorkerExit::ChannelClosed,
        }
    }

    /// Number of messages that reached a final outcome.
    pub fn processed(&self) -> u64 {
        self.persisted
            + self.decode_skipped
            + self.validation_skipped
            + self.duplicates
            + self.failed.len() as u64
    }

    /// Returns true if the partition recorded any error.
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty() || !self.errors.is_empty()
    }

    /// Moves every recorded error out of the report.
    pub(crate) fn take_errors(&mut self) -> Vec<IngestError> {
        let partition = self.partition;
        let mut errors: Vec<IngestError> = self
            .failed
            .drain(..)
            .map(|f| IngestError::Persist {
                partition,
                offset: f.offset,
                order_uid: f.order_uid,
                source: f.error,
            })
            .collect();
        errors.append(&mut self.errors);
        errors
    }
}

enum Event {
    Cancelled,
    Message(Option<Message>),
    Transport(Option<BrokerError>),
}

enum Flow {
    Continue,
    Stop,
}

/// Consumes one partition: decode, validate, persist with retry.
///
/// Per-message failures never stop the worker. It returns when the message
/// stream ends or cancellation is requested, after closing its partition.
pub struct PartitionWorker<R> {
    partition: PartitionId,
    consumer: PartitionConsumer,
    store: Arc<R>,
    validator: OrderValidator,
    retry: RetryPolicy,
    errors: mpsc::Sender<IngestError>,
    cancel: CancellationToken,
    state: watch::Sender<WorkerState>,
    report: PartitionReport,
}

impl<R: OrderRepository> PartitionWorker<R> {
    pub fn new(
        consumer: PartitionConsumer,
        store: Arc<R>,
        retry: RetryPolicy,
        errors: mpsc::Sender<IngestError>,
        cancel: CancellationToken,
    ) -> Self {
        let partition = consumer.partition();
        Self {
            partition,
            consumer,
            store,
            validator: OrderValidator::new(),
            retry,
            errors,
            cancel,
            state: watch::Sender::new(WorkerState::Running),
            report: PartitionReport::new(partition),
        }
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Follows the worker's state while [`run`](Self::run) owns it. The last
    /// value seen after the run returns is [`WorkerState::Stopped`].
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Runs the worker to completion.
    #[tracing::instrument(skip(self), fields(partition = %self.partition))]
    pub async fn run(mut self) -> PartitionReport {
        tracing::info!("partition worker started");
        let mut errors_open = true;

        let exit = loop {
            self.transition(WorkerState::Running);

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Event::Cancelled,
                error = self.consumer.errors.recv(), if errors_open => Event::Transport(error),
                message = self.consumer.messages.recv() => Event::Message(message),
            };

            match event {
                Event::Cancelled => break WorkerExit::Cancelled,
                Event::Message(None) => {
                    tracing::info!("message stream closed");
                    break WorkerExit::ChannelClosed;
                }
                Event::Message(Some(message)) => {
                    if let Flow::Stop = self.handle_message(message).await {
                        break WorkerExit::Cancelled;
                    }
                }
                Event::Transport(None) => {
                    tracing::debug!("error stream closed");
                    errors_open = false;
                }
                Event::Transport(Some(error)) => {
                    if let Flow::Stop = self.forward_transport_error(error).await {
                        break WorkerExit::Cancelled;
                    }
                }
            }
        };

        if exit == WorkerExit::Cancelled {
            self.transition(WorkerState::Draining);
            tracing::info!("cancellation requested, shutting down partition worker");
        }

        if let Err(source) = self.consumer.close() {
            tracing::error!(error = %source, "failed to close partition");
            self.report.errors.push(IngestError::ClosePartition {
                partition: self.partition,
                source,
            });
        }
        self.transition(WorkerState::Stopped);

        self.report.exit = exit;
        tracing::info!(
            persisted = self.report.persisted,
            failed = self.report.failed.len(),
            exit = ?exit,
            "partition worker stopped"
        );
        self.report
    }

    async fn handle_message(&mut self, message: Message) -> Flow {
        metrics::counter!("ingest_messages_total").increment(1);

        self.transition(WorkerState::Decoding);
        let order = match Order::from_json(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                metrics::counter!("ingest_decode_failures_total").increment(1);
                tracing::error!(offset = message.offset, error = %e, "failed to decode message, skipping");
                self.report.decode_skipped += 1;
                return Flow::Continue;
            }
        };

        self.transition(WorkerState::Validating);
        if let Err(e) = self.validator.validate(&order) {
            metrics::counter!("ingest_validation_failures_total").increment(1);
            tracing::error!(
                offset = message.offset,
                order_uid = %order.order_uid,
                error = %e,
                "order failed validation, skipping"
            );
            self.report.validation_skipped += 1;
            return Flow::Continue;
        }

        self.transition(WorkerState::Persisting);
        self.persist(&order, message.offset).await
    }

    async fn persist(&mut self, order: &Order, offset: i64) -> Flow {
        let mut attempt = 0;
        loop {
            let error = match self.store.create(order).await {
                Ok(id) => {
                    metrics::counter!("ingest_orders_persisted_total").increment(1);
                    tracing::info!(offset, order_uid = %order.order_uid, order_id = %id, "order persisted");
                    self.report.persisted += 1;
                    return Flow::Continue;
                }
                Err(e) if e.is_duplicate() => {
                    metrics::counter!("ingest_duplicates_total").increment(1);
                    tracing::info!(offset, order_uid = %order.order_uid, "order already stored, skipping");
                    self.report.duplicates += 1;
                    return Flow::Continue;
                }
                Err(e) => e,
            };

            if !error.is_retryable() || !self.retry.should_retry(attempt) {
                metrics::counter!("ingest_persist_failures_total").increment(1);
                tracing::error!(
                    offset,
                    order_uid = %order.order_uid,
                    attempts = attempt + 1,
                    error = %error,
                    "giving up on order"
                );
                self.report.failed.push(FailedMessage {
                    offset,
                    order_uid: order.order_uid.clone(),
                    attempts: attempt + 1,
                    error,
                });
                return Flow::Continue;
            }

            let backoff = self.retry.backoff(attempt);
            metrics::counter!("ingest_persist_retries_total").increment(1);
            tracing::warn!(
                offset,
                order_uid = %order.order_uid,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "persist attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(offset, order_uid = %order.order_uid, "cancelled during backoff");
                    return Flow::Stop;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            attempt += 1;
        }
    }

    async fn forward_transport_error(&mut self, error: BrokerError) -> Flow {
        metrics::counter!("ingest_transport_errors_total").increment(1);
        tracing::error!(error = %error, "partition transport error");

        self.report.errors.push(IngestError::Transport {
            partition: self.partition,
            source: error.clone(),
        });

        let forwarded = IngestError::Transport {
            partition: self.partition,
            source: error,
        };
        match self.errors.try_send(forwarded) {
            Ok(()) => Flow::Continue,
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("error channel closed, transport error not forwarded");
                Flow::Continue
            }
            Err(TrySendError::Full(forwarded)) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Flow::Stop,
                    _ = self.errors.send(forwarded) => Flow::Continue,
                }
            }
        }
    }

    fn transition(&self, next: WorkerState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::trace!(from = ?*state, to = ?next, "worker state");
            *state = next;
            true
        });
    }
}
