use std::time::Duration;

use async_trait::async_trait;
use franz_common::{Envelope, Headers};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers as _};
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};
use tracing::debug;

use crate::config::KafkaConfig;
use crate::error::TransportError;
use crate::offsets::TopicPartition;

/// A record as handed out by the broker, owned so it can outlive the poll that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    /// In wire order; a name may appear more than once.
    pub headers: Vec<(String, Option<Vec<u8>>)>,
}

impl NativeRecord {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.as_str(), self.partition)
    }

    /// Normalize into an [`Envelope`]. Every header is copied, including repeated names;
    /// missing keys, payloads and header values become empty.
    pub fn to_envelope(&self) -> Envelope {
        let key = self
            .key
            .as_deref()
            .map(|key| String::from_utf8_lossy(key).into_owned())
            .unwrap_or_default();

        let headers: Headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                let value = value
                    .as_deref()
                    .map(|value| String::from_utf8_lossy(value).into_owned())
                    .unwrap_or_default();
                (name.clone(), value)
            })
            .collect();

        Envelope::new(key, self.payload.clone().unwrap_or_default(), headers)
    }
}

impl From<&BorrowedMessage<'_>> for NativeRecord {
    fn from(message: &BorrowedMessage<'_>) -> Self {
        let headers = message
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|header| (header.key.to_owned(), header.value.map(<[u8]>::to_vec)))
                    .collect()
            })
            .unwrap_or_default();

        NativeRecord {
            topic: message.topic().to_owned(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
            headers,
        }
    }
}

/// The operations the consumer loop needs from a broker client.
///
/// The loop owns its client exclusively. Group membership and reconnection are left to the
/// implementation.
#[async_trait]
pub trait BrokerClient: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Wait at most `timeout` for the next record. `Ok(None)` means nothing arrived in time.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<NativeRecord>, TransportError>;

    /// Set the committed position of `partition` to `next_offset`, acknowledging every record
    /// before it.
    async fn commit(
        &mut self,
        partition: &TopicPartition,
        next_offset: i64,
    ) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// [`BrokerClient`] backed by an rdkafka `StreamConsumer` with automatic commits disabled.
pub struct KafkaBroker {
    consumer: StreamConsumer,
}

impl KafkaBroker {
    pub fn new(config: &KafkaConfig) -> Result<Self, TransportError> {
        let client_config: ClientConfig = config.into();
        debug!("rdkafka configuration: {:?}", client_config);

        let consumer: StreamConsumer = client_config.create()?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl BrokerClient for KafkaBroker {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.consumer.subscribe(&[topic])?;
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<NativeRecord>, TransportError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Err(error)) => Err(error.into()),
            Ok(Ok(message)) => Ok(Some(NativeRecord::from(&message))),
        }
    }

    async fn commit(
        &mut self,
        partition: &TopicPartition,
        next_offset: i64,
    ) -> Result<(), TransportError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            partition.topic(),
            partition.partition_number(),
            Offset::Offset(next_offset),
        )?;
        self.consumer.commit(&offsets, CommitMode::Sync)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.consumer.unsubscribe();
        Ok(())
    }
}
