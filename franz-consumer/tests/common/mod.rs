#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use franz_common::health::{HealthHandle, HealthRegistry};
use franz_common::Envelope;
use franz_consumer::broker::{BrokerClient, NativeRecord};
use franz_consumer::consumer::ConsumerLoop;
use franz_consumer::dead_letter::{DeadLetterError, DeadLetterSink};
use franz_consumer::dispatch::DispatchHandler;
use franz_consumer::error::{DispatchError, ProcessingError, TransportError};
use franz_consumer::offsets::TopicPartition;
use franz_consumer::processor::Processor;
use franz_consumer::registry::ProcessorRegistry;

pub const TOPIC: &str = "franz.consumer";
pub const HEADER: &str = "EntityType";
pub const POLL_TIMEOUT: Duration = Duration::from_millis(20);
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub async fn wait_for_condition<F>(timeout: Duration, interval: Duration, f: F)
where
    F: Fn() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        tokio::time::sleep(interval).await;
    }
    panic!("condition not met within {timeout:?}");
}

pub async fn eventually<Fut>(fut: Fut) -> Fut::Output
where
    Fut: Future,
{
    tokio::time::timeout(WAIT_TIMEOUT, fut)
        .await
        .expect("future did not complete in time")
}

// ── Records ──────────────────────────────────────────────────────

pub fn record(offset: i64, entity_type: Option<&str>, body: &str) -> NativeRecord {
    NativeRecord {
        topic: TOPIC.to_owned(),
        partition: 0,
        offset,
        key: Some(format!("key-{offset}").into_bytes()),
        payload: Some(body.as_bytes().to_vec()),
        headers: entity_type
            .map(|tag| vec![(HEADER.to_owned(), Some(tag.as_bytes().to_vec()))])
            .unwrap_or_default(),
    }
}

pub fn order(offset: i64, id: u32) -> NativeRecord {
    record(offset, Some("Order"), &format!(r#"{{"id": {id}}}"#))
}

pub fn on_partition(partition: i32, record: NativeRecord) -> NativeRecord {
    NativeRecord { partition, ..record }
}

// ── Broker ───────────────────────────────────────────────────────

pub type Poll = Result<Option<NativeRecord>, TransportError>;

/// What the fake broker has been asked to do, shared with the test.
#[derive(Default)]
pub struct BrokerLog {
    pub subscribed: Vec<String>,
    /// (partition, next offset) of each commit, in commit order.
    pub commits: Vec<(i32, i64)>,
    /// Committed group position per partition, as the broker would keep it.
    pub positions: HashMap<i32, i64>,
    pub closed: bool,
}

impl BrokerLog {
    /// Position a restarted consumer would resume `partition` from.
    pub fn position(&self, partition: i32) -> Option<i64> {
        self.positions.get(&partition).copied()
    }
}

/// A broker that hands out a scripted sequence of poll results, then idles.
pub struct FakeBroker {
    script: VecDeque<Poll>,
    failing_commits: HashSet<i64>,
    fail_subscribe: bool,
    log: Arc<Mutex<BrokerLog>>,
}

impl FakeBroker {
    pub fn new(script: impl IntoIterator<Item = Poll>) -> Self {
        Self {
            script: script.into_iter().collect(),
            failing_commits: HashSet::new(),
            fail_subscribe: false,
            log: Arc::default(),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = NativeRecord>) -> Self {
        Self::new(records.into_iter().map(|record| Ok(Some(record))))
    }

    /// Reject commits that would move a partition to `next_offset`.
    pub fn failing_commit(mut self, next_offset: i64) -> Self {
        self.failing_commits.insert(next_offset);
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<BrokerLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl BrokerClient for FakeBroker {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if self.fail_subscribe {
            return Err(TransportError::Other("broker unreachable".to_owned()));
        }
        self.log.lock().unwrap().subscribed.push(topic.to_owned());
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<NativeRecord>, TransportError> {
        match self.script.pop_front() {
            Some(poll) => poll,
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn commit(
        &mut self,
        partition: &TopicPartition,
        next_offset: i64,
    ) -> Result<(), TransportError> {
        if self.failing_commits.contains(&next_offset) {
            return Err(TransportError::Other("commit rejected".to_owned()));
        }
        let mut log = self.log.lock().unwrap();
        log.commits.push((partition.partition_number(), next_offset));
        log.positions.insert(partition.partition_number(), next_offset);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

// ── Processors ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct Order {
    pub id: u32,
}

/// Records every order it sees. Orders listed in `failing` are rejected.
#[derive(Default)]
pub struct OrderProcessor {
    pub seen: Arc<Mutex<Vec<u32>>>,
    pub failing: HashSet<u32>,
}

#[async_trait]
impl Processor for OrderProcessor {
    type Entity = Order;
    const ENTITY_TYPE: &'static str = "Order";

    async fn process(&self, order: Order) -> Result<(), ProcessingError> {
        self.seen.lock().unwrap().push(order.id);
        if self.failing.contains(&order.id) {
            return Err(ProcessingError::Rejected(format!("order {}", order.id)));
        }
        Ok(())
    }
}

// ── Dead letters ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub source_topic: String,
    pub key: String,
    pub kind: &'static str,
}

#[derive(Default)]
pub struct FakeDeadLetterSink {
    pub sent: Mutex<Vec<DeadLetter>>,
    pub unavailable: bool,
}

#[async_trait]
impl DeadLetterSink for FakeDeadLetterSink {
    async fn send(
        &self,
        source_topic: &str,
        envelope: &Envelope,
        error: &DispatchError,
    ) -> Result<(), DeadLetterError> {
        if self.unavailable {
            return Err(DeadLetterError::Unavailable("sink is down".to_owned()));
        }
        self.sent.lock().unwrap().push(DeadLetter {
            source_topic: source_topic.to_owned(),
            key: envelope.key().to_owned(),
            kind: error.kind().as_label(),
        });
        Ok(())
    }
}

// ── Component builders ───────────────────────────────────────────

/// Dispatcher with a single `Order` processor whose seen orders are returned.
pub fn order_dispatcher(failing: &[u32]) -> (DispatchHandler, Arc<Mutex<Vec<u32>>>) {
    let processor = OrderProcessor {
        failing: failing.iter().copied().collect(),
        ..Default::default()
    };
    let seen = processor.seen.clone();

    let mut registry = ProcessorRegistry::new();
    registry.register(processor).unwrap();
    (DispatchHandler::new(Arc::new(registry), HEADER), seen)
}

pub fn liveness() -> (HealthRegistry, HealthHandle) {
    let registry = HealthRegistry::new("liveness");
    let handle = registry.register("consumer".to_owned(), time::Duration::seconds(30));
    (registry, handle)
}

pub fn consumer(
    broker: FakeBroker,
    dispatcher: DispatchHandler,
    liveness: HealthHandle,
) -> ConsumerLoop<FakeBroker> {
    ConsumerLoop::new(broker, TOPIC, POLL_TIMEOUT, dispatcher, liveness)
}
