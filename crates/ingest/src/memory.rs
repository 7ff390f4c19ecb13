use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::PartitionId;
use tokio::sync::{Mutex, mpsc};

use crate::{Broker, BrokerError, Message, PartitionConsumer, StartOffset};

struct PartitionSlot {
    pending: Option<(mpsc::Receiver<Message>, mpsc::Receiver<BrokerError>)>,
    closed: Arc<AtomicBool>,
    open_failure: Option<BrokerError>,
    close_failure: Option<BrokerError>,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, BTreeMap<PartitionId, PartitionSlot>>,
    list_failure: Option<BrokerError>,
}

/// Channel-backed broker for tests and embedding.
///
/// Every message published to a partition is delivered once the partition
/// is opened; offsets start at 0 and [`StartOffset`] is ignored. Each
/// partition can be opened once.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
    open_calls: Arc<AtomicUsize>,
}

impl InMemoryBroker {
    /// Creates a new broker with no topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a topic with `partitions` partitions, each buffering up to
    /// `capacity` messages, and returns one writer per partition.
    pub async fn create_topic(
        &self,
        topic: &str,
        partitions: i32,
        capacity: usize,
    ) -> Vec<PartitionWriter> {
        let mut state = self.state.lock().await;
        let slots = state.topics.entry(topic.to_string()).or_default();

        (0..partitions)
            .map(|p| {
                let partition = PartitionId::new(p);
                let (msg_tx, msg_rx) = mpsc::channel(capacity.max(1));
                let (err_tx, err_rx) = mpsc::channel(capacity.max(1));
                slots.insert(
                    partition,
                    PartitionSlot {
                        pending: Some((msg_rx, err_rx)),
                        closed: Arc::new(AtomicBool::new(false)),
                        open_failure: None,
                        close_failure: None,
                    },
                );
                PartitionWriter {
                    partition,
                    next_offset: 0,
                    messages: Some(msg_tx),
                    errors: Some(err_tx),
                }
            })
            .collect()
    }

    /// Makes listing partitions fail.
    pub async fn fail_list(&self, error: BrokerError) {
        self.state.lock().await.list_failure = Some(error);
    }

    /// Makes opening one partition fail.
    pub async fn fail_open(&self, topic: &str, partition: PartitionId, error: BrokerError) {
        if let Some(slot) = self.slot_mut(&mut *self.state.lock().await, topic, partition) {
            slot.open_failure = Some(error);
        }
    }

    /// Makes closing one partition fail.
    pub async fn fail_close(&self, topic: &str, partition: PartitionId, error: BrokerError) {
        if let Some(slot) = self.slot_mut(&mut *self.state.lock().await, topic, partition) {
            slot.close_failure = Some(error);
        }
    }

    /// Returns true if the partition was opened and then closed.
    pub async fn is_closed(&self, topic: &str, partition: PartitionId) -> bool {
        self.state
            .lock()
            .await
            .topics
            .get(topic)
            .and_then(|slots| slots.get(&partition))
            .is_some_and(|slot| slot.closed.load(Ordering::SeqCst))
    }

    /// Number of `open_partition` calls received, including failed ones.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    fn slot_mut<'a>(
        &self,
        state: &'a mut State,
        topic: &str,
        partition: PartitionId,
    ) -> Option<&'a mut PartitionSlot> {
        state.topics.get_mut(topic)?.get_mut(&partition)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn partitions(&self, topic: &str) -> Result<Vec<PartitionId>, BrokerError> {
        let state = self.state.lock().await;
        if let Some(error) = &state.list_failure {
            return Err(error.clone());
        }
        state
            .topics
            .get(topic)
            .map(|slots| slots.keys().copied().collect())
            .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))
    }

    async fn open_partition(
        &self,
        topic: &str,
        partition: PartitionId,
        _offset: StartOffset,
    ) -> Result<PartitionConsumer, BrokerError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        let slot = self
            .slot_mut(&mut state, topic, partition)
            .ok_or_else(|| BrokerError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })?;

        if let Some(error) = &slot.open_failure {
            return Err(error.clone());
        }
        let (messages, errors) = slot
            .pending
            .take()
            .ok_or(BrokerError::AlreadyOpen(partition))?;

        let closed = slot.closed.clone();
        let close_failure = slot.close_failure.clone();
        Ok(PartitionConsumer::new(partition, messages, errors, move || {
            closed.store(true, Ordering::SeqCst);
            close_failure.map_or(Ok(()), Err)
        }))
    }
}

/// Producer side of one in-memory partition.
///
/// Dropping the writer ends the partition's message stream.
#[derive(Debug)]
pub struct PartitionWriter {
    partition: PartitionId,
    next_offset: i64,
    messages: Option<mpsc::Sender<Message>>,
    errors: Option<mpsc::Sender<BrokerError>>,
}

impl PartitionWriter {
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Appends a message and returns its offset.
    pub async fn publish(&mut self, payload: impl Into<Vec<u8>>) -> Result<i64, BrokerError> {
        let offset = self.next_offset;
        let message = Message {
            partition: self.partition,
            offset,
            key: None,
            payload: payload.into(),
        };

        let sender = self
            .messages
            .as_ref()
            .ok_or_else(|| BrokerError::Transport("partition finished".to_string()))?;
        sender
            .send(message)
            .await
            .map_err(|_| BrokerError::Transport("partition consumer dropped".to_string()))?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Delivers an error on the partition's error stream.
    pub async fn push_error(&self, error: BrokerError) -> Result<(), BrokerError> {
        let sender = self
            .errors
            .as_ref()
            .ok_or_else(|| BrokerError::Transport("error stream closed".to_string()))?;
        sender
            .send(error)
            .await
            .map_err(|_| BrokerError::Transport("partition consumer dropped".to_string()))
    }

    /// Ends the error stream while leaving the message stream open.
    pub fn close_errors(&mut self) {
        self.errors = None;
    }

    /// Ends the message stream.
    pub fn finish(&mut self) {
        self.messages = None;
    }
}
