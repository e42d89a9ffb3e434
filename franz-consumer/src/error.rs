use rdkafka::error::KafkaError;
use thiserror::Error;
use tracing::Level;

/// Enumeration of errors a typed processor can raise for a single entity.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("{entity} failed validation: {reason}")]
    Validation {
        entity: &'static str,
        reason: String,
    },
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("entity rejected: {0}")]
    Rejected(String),
}

impl ProcessingError {
    pub fn validation(entity: &'static str, reason: impl Into<String>) -> Self {
        ProcessingError::Validation {
            entity,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("repository is unavailable: {0}")]
    Unavailable(String),
}

/// Why a message could not be dispatched to a processor.
#[derive(Error, Debug)]
pub enum DispatchErrorKind {
    #[error("message has no {0} header")]
    MissingRoutingMetadata(String),
    #[error("no processor registered for entity type {0}")]
    UnknownMessageType(String),
    #[error("payload is not a valid {entity_type}: {error}")]
    MalformedPayload {
        entity_type: &'static str,
        error: serde_json::Error,
    },
    #[error("processing failed: {0}")]
    ProcessingFailure(#[from] ProcessingError),
}

impl DispatchErrorKind {
    /// Stable label for metrics and structured logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchErrorKind::MissingRoutingMetadata(_) => "missing_routing_metadata",
            DispatchErrorKind::UnknownMessageType(_) => "unknown_message_type",
            DispatchErrorKind::MalformedPayload { .. } => "malformed_payload",
            DispatchErrorKind::ProcessingFailure(_) => "processing_failure",
        }
    }

    /// Level the failure is logged at. Unroutable messages are warnings, everything that
    /// reached a processor's type is an error.
    pub fn log_level(&self) -> Level {
        match self {
            DispatchErrorKind::MissingRoutingMetadata(_)
            | DispatchErrorKind::UnknownMessageType(_) => Level::WARN,
            DispatchErrorKind::MalformedPayload { .. }
            | DispatchErrorKind::ProcessingFailure(_) => Level::ERROR,
        }
    }

    /// A poison message will fail the same way on every redelivery: no processor can ever
    /// accept it as it is.
    pub fn is_poison(&self) -> bool {
        !matches!(self, DispatchErrorKind::ProcessingFailure(_))
    }
}

/// A dispatch failure with the context identifying the message it happened on.
#[derive(Error, Debug)]
#[error("failed to dispatch message with key {key:?} (entity type: {}): {kind}", .entity_type.as_deref().unwrap_or("none"))]
pub struct DispatchError {
    pub key: String,
    pub entity_type: Option<String>,
    #[source]
    pub kind: DispatchErrorKind,
}

impl DispatchError {
    pub fn kind(&self) -> &DispatchErrorKind {
        &self.kind
    }
}

/// Enumeration of errors raised by the broker client while polling or committing.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("transport error: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("a processor is already registered for entity type {0}")]
    Duplicate(String),
    #[error("cannot alias {alias} to unregistered entity type {target}")]
    UnknownTarget { alias: String, target: String },
}

/// Enumeration of errors related to the lifecycle of a consumer loop. These are the only
/// errors that leave the loop.
#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("failed to create the broker client: {0}")]
    Client(#[source] TransportError),
    #[error("failed to subscribe to topic {topic}: {error}")]
    Subscribe {
        topic: String,
        #[source]
        error: TransportError,
    },
    #[error("the consumer loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
