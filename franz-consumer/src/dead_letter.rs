use std::time::Duration;

use async_trait::async_trait;
use franz_common::Envelope;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use thiserror::Error;
use tracing::debug;

use crate::config::KafkaConfig;
use crate::error::DispatchError;

pub const ERROR_KIND_HEADER: &str = "franz-dlq-error-kind";
pub const ERROR_HEADER: &str = "franz-dlq-error";
pub const SOURCE_TOPIC_HEADER: &str = "franz-dlq-source-topic";

#[derive(Error, Debug)]
pub enum DeadLetterError {
    #[error("failed to produce to the dead letter topic: {0}")]
    Produce(#[from] KafkaError),
    #[error("dead letter sink unavailable: {0}")]
    Unavailable(String),
}

/// Somewhere to park messages that can never be processed, so their offsets can be committed
/// without losing them.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Must only return once the message is durably stored.
    async fn send(
        &self,
        source_topic: &str,
        envelope: &Envelope,
        error: &DispatchError,
    ) -> Result<(), DeadLetterError>;
}

/// The headers of `envelope` plus the failure description.
pub fn dead_letter_headers(
    source_topic: &str,
    envelope: &Envelope,
    error: &DispatchError,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = envelope
        .headers()
        .iter()
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect();
    headers.push((
        ERROR_KIND_HEADER.to_owned(),
        error.kind().as_label().to_owned(),
    ));
    headers.push((ERROR_HEADER.to_owned(), error.to_string()));
    headers.push((SOURCE_TOPIC_HEADER.to_owned(), source_topic.to_owned()));
    headers
}

pub struct KafkaDeadLetterSink {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaDeadLetterSink {
    pub fn new(config: &KafkaConfig, topic: &str) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("message.timeout.ms", "20000")
            .set("enable.idempotence", "true");

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        debug!("rdkafka dead letter configuration: {:?}", client_config);
        let producer: FutureProducer = client_config.create()?;

        Ok(Self {
            producer,
            topic: topic.to_owned(),
            timeout: Duration::from_secs(20),
        })
    }
}

#[async_trait]
impl DeadLetterSink for KafkaDeadLetterSink {
    async fn send(
        &self,
        source_topic: &str,
        envelope: &Envelope,
        error: &DispatchError,
    ) -> Result<(), DeadLetterError> {
        let headers = dead_letter_headers(source_topic, envelope, error)
            .iter()
            .fold(OwnedHeaders::new(), |headers, (key, value)| {
                headers.insert(Header {
                    key: key.as_str(),
                    value: Some(value.as_str()),
                })
            });

        let mut record = FutureRecord::<str, [u8]>::to(&self.topic)
            .payload(envelope.body())
            .headers(headers);
        if !envelope.key().is_empty() {
            record = record.key(envelope.key());
        }

        self.producer
            .send(record, self.timeout)
            .await
            .map_err(|(error, _)| DeadLetterError::Produce(error))?;
        Ok(())
    }
}
