use std::fmt;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use rdkafka::ClientConfig;
use thiserror::Error;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3302")]
    pub port: u16,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    // Takes precedence over the name derived from service_name
    pub kafka_consumer_topic: Option<NonEmptyString>,

    #[envconfig(default = "franz.consumer")]
    pub service_name: String,

    #[envconfig(default = "EntityType")]
    pub entity_type_header: NonEmptyString,

    #[envconfig(default = "1000")]
    pub poll_timeout: EnvMsDuration,

    pub dead_letter_topic: Option<NonEmptyString>,

    #[envconfig(default = "30000")]
    pub liveness_deadline: EnvMsDuration,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The topic to subscribe to: the explicit one if configured, otherwise derived from the
    /// service name.
    pub fn topic(&self) -> Result<String, ConfigError> {
        match &self.kafka_consumer_topic {
            Some(topic) => Ok(topic.as_str().to_owned()),
            None => resolve_topic_name(&self.service_name),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kafka.kafka_consumer_auto_commit {
            return Err(ConfigError::AutoCommitEnabled);
        }
        if self.kafka.kafka_consumer_group.trim().is_empty() {
            return Err(ConfigError::EmptyConsumerGroup);
        }
        self.topic()?;
        Ok(())
    }
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "franz-consumer")]
    pub kafka_consumer_group: String,

    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: OffsetReset,

    // Offsets are committed by the consumer loop once a message is processed. Enabling this
    // would acknowledge messages before they are handled, so validation rejects it.
    #[envconfig(default = "false")]
    pub kafka_consumer_auto_commit: bool,

    #[envconfig(default = "10000")]
    pub kafka_session_timeout_ms: u32,
}

impl From<&KafkaConfig> for ClientConfig {
    fn from(config: &KafkaConfig) -> Self {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", &config.kafka_consumer_group)
            .set(
                "auto.offset.reset",
                config.kafka_consumer_offset_reset.to_string(),
            )
            .set(
                "enable.auto.commit",
                config.kafka_consumer_auto_commit.to_string(),
            )
            .set("enable.auto.offset.store", "false")
            .set(
                "session.timeout.ms",
                config.kafka_session_timeout_ms.to_string(),
            );

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };
        client_config
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("auto commit must be disabled, offsets are committed after processing")]
    AutoCommitEnabled,
    #[error("consumer group cannot be empty")]
    EmptyConsumerGroup,
    #[error("cannot derive a topic name from service name {0:?}")]
    InvalidTopicIdentity(String),
}

/// Derive a topic name from a deployment identity such as `Franz.Consumer`.
///
/// The identity is lower-cased, every character outside `[a-z0-9._-]` becomes a `.`, runs of
/// dots are collapsed and leading/trailing dots dropped.
pub fn resolve_topic_name(identity: &str) -> Result<String, ConfigError> {
    let mut topic = String::with_capacity(identity.len());
    for c in identity.chars().flat_map(char::to_lowercase) {
        let c = match c {
            'a'..='z' | '0'..='9' | '_' | '-' | '.' => c,
            _ => '.',
        };
        if c == '.' && (topic.is_empty() || topic.ends_with('.')) {
            continue;
        }
        topic.push(c);
    }
    while topic.ends_with('.') {
        topic.pop();
    }

    if topic.is_empty() {
        Err(ConfigError::InvalidTopicIdentity(identity.to_owned()))
    } else {
        Ok(topic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    Earliest,
    Latest,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseOffsetResetError(String);

impl fmt::Display for ParseOffsetResetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} is not a valid offset reset policy", self.0)
    }
}

impl FromStr for OffsetReset {
    type Err = ParseOffsetResetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "earliest" => Ok(OffsetReset::Earliest),
            "latest" => Ok(OffsetReset::Latest),
            invalid => Err(ParseOffsetResetError(invalid.to_owned())),
        }
    }
}

impl fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OffsetReset::Earliest => write!(f, "earliest"),
            OffsetReset::Latest => write!(f, "latest"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}
