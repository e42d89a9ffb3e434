use std::sync::Arc;
use std::time::Duration;

use franz_common::health::{ComponentStatus, HealthHandle};
use franz_common::Envelope;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};

use crate::broker::{BrokerClient, NativeRecord};
use crate::dead_letter::DeadLetterSink;
use crate::dispatch::DispatchHandler;
use crate::error::{ConsumerError, DispatchError};
use crate::metrics_consts::{
    DEAD_LETTERED, DISPATCH_ERRORS, FAILED_OFFSETS_HELD, MESSAGES_COMMITTED, MESSAGES_RECEIVED,
    TRANSPORT_ERRORS,
};
use crate::offsets::OffsetTracker;

// Keeps a broken connection from turning the loop into a busy spin.
const TRANSPORT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// What a single iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing arrived before the poll timeout.
    Idle,
    /// Processed and committed, up to the lowest failed offset of the partition.
    Committed,
    /// Poison message stored in the dead letter sink, then committed.
    DeadLettered,
    /// Dispatch failed, the offset was left alone so the message will be delivered again.
    NotCommitted,
    /// Polling or committing failed.
    TransportFailure,
}

/// Pulls records from one topic and hands them to a [`DispatchHandler`], one at a time.
///
/// A record's offset is committed only after its processor succeeded, never before. When
/// dispatch fails the error is logged and the offset is left alone; the loop moves on to the
/// next record, but the committed position of that partition stays at the failed record so a
/// restart or rebalance delivers it again. Nothing that happens to a single message stops the loop: only cancellation
/// does, and it is checked between iterations, so a poll in flight may block for up to
/// `poll_timeout` before the loop notices.
pub struct ConsumerLoop<B> {
    broker: B,
    topic: String,
    poll_timeout: Duration,
    dispatcher: DispatchHandler,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    offsets: OffsetTracker,
    liveness: HealthHandle,
    state: watch::Sender<LoopState>,
}

impl<B: BrokerClient + 'static> ConsumerLoop<B> {
    pub fn new(
        broker: B,
        topic: &str,
        poll_timeout: Duration,
        dispatcher: DispatchHandler,
        liveness: HealthHandle,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Stopped);
        Self {
            broker,
            topic: topic.to_owned(),
            poll_timeout,
            dispatcher,
            dead_letter: None,
            offsets: OffsetTracker::new(),
            liveness,
            state,
        }
    }

    /// Forward poison messages to `sink` and commit them once stored, instead of leaving
    /// them to be redelivered forever.
    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Subscribe to the topic and spawn the loop on the tokio runtime.
    ///
    /// Subscribing happens before this returns, so a broker that cannot be reached fails the
    /// caller's startup instead of a background task.
    pub async fn start(mut self, shutdown: CancellationToken) -> Result<ConsumerHandle, ConsumerError> {
        self.state.send_replace(LoopState::Starting);
        info!(topic = %self.topic, "starting consumer");

        if let Err(error) = self.broker.subscribe(&self.topic).await {
            error!(topic = %self.topic, error = %error, "failed to subscribe");
            self.state.send_replace(LoopState::Stopped);
            return Err(ConsumerError::Subscribe {
                topic: self.topic,
                error,
            });
        }

        self.state.send_replace(LoopState::Running);
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(shutdown.clone()));

        Ok(ConsumerHandle {
            shutdown,
            task,
            state,
        })
    }

    async fn run(mut self, shutdown: CancellationToken) {
        while !shutdown.is_cancelled() {
            self.liveness.report_healthy();
            self.poll_once().await;
        }

        self.state.send_replace(LoopState::Stopping);
        info!(topic = %self.topic, "stopping consumer");

        if let Err(error) = self.broker.close().await {
            error!(topic = %self.topic, error = %error, "failed to close broker client");
        }
        self.liveness.report_status(ComponentStatus::Unhealthy);
        self.state.send_replace(LoopState::Stopped);
        info!(topic = %self.topic, "consumer stopped");
    }

    /// Run one iteration: poll, dispatch, then commit or not.
    pub async fn poll_once(&mut self) -> Outcome {
        let record = match self.broker.poll(self.poll_timeout).await {
            Ok(Some(record)) => record,
            Ok(None) => return Outcome::Idle,
            Err(error) => {
                metrics::counter!(TRANSPORT_ERRORS, "op" => "poll").increment(1);
                error!(
                    topic = %self.topic,
                    error_kind = "transport_failure",
                    error = %error,
                    "failed to poll for messages"
                );
                tokio::time::sleep(TRANSPORT_ERROR_BACKOFF).await;
                return Outcome::TransportFailure;
            }
        };
        metrics::counter!(MESSAGES_RECEIVED).increment(1);

        let envelope = record.to_envelope();
        match self.dispatcher.dispatch(&envelope).await {
            Ok(entity_type) => {
                info!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    key = envelope.key(),
                    entity_type,
                    "processed message"
                );
                self.commit(&record, Outcome::Committed).await
            }
            Err(error) => self.handle_failure(&record, &envelope, error).await,
        }
    }

    async fn handle_failure(
        &mut self,
        record: &NativeRecord,
        envelope: &Envelope,
        error: DispatchError,
    ) -> Outcome {
        let kind = error.kind().as_label();
        metrics::counter!(DISPATCH_ERRORS, "kind" => kind).increment(1);

        let entity_type = error.entity_type.as_deref().unwrap_or_default();
        if error.kind().log_level() == Level::WARN {
            warn!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                key = %error.key,
                entity_type,
                error_kind = kind,
                error = %error,
                "cannot route message"
            );
        } else {
            error!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                key = %error.key,
                entity_type,
                error_kind = kind,
                error = %error,
                "failed to process message"
            );
        }

        let sink = match &self.dead_letter {
            Some(sink) if error.kind().is_poison() => sink.clone(),
            _ => return self.hold(record),
        };

        match sink.send(&record.topic, envelope, &error).await {
            Ok(()) => {
                metrics::counter!(DEAD_LETTERED, "kind" => kind).increment(1);
                self.commit(record, Outcome::DeadLettered).await
            }
            Err(dlq_error) => {
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    key = %error.key,
                    error = %dlq_error,
                    "failed to dead letter message, leaving it uncommitted"
                );
                self.hold(record)
            }
        }
    }

    fn hold(&mut self, record: &NativeRecord) -> Outcome {
        self.offsets.mark_failed(&record.topic_partition(), record.offset);
        metrics::gauge!(FAILED_OFFSETS_HELD).set(self.offsets.failed_count() as f64);
        Outcome::NotCommitted
    }

    async fn commit(&mut self, record: &NativeRecord, outcome: Outcome) -> Outcome {
        let partition = record.topic_partition();
        let next_offset = self.offsets.mark_done(&partition, record.offset);
        metrics::gauge!(FAILED_OFFSETS_HELD).set(self.offsets.failed_count() as f64);
        if next_offset <= record.offset {
            debug!(
                %partition,
                offset = record.offset,
                held_at = next_offset,
                "committed position held back by an earlier failed record"
            );
        }

        match self.broker.commit(&partition, next_offset).await {
            Ok(()) => {
                metrics::counter!(MESSAGES_COMMITTED).increment(1);
                outcome
            }
            Err(error) => {
                metrics::counter!(TRANSPORT_ERRORS, "op" => "commit").increment(1);
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error_kind = "transport_failure",
                    error = %error,
                    "failed to commit offset"
                );
                Outcome::TransportFailure
            }
        }
    }
}

/// Control over a started [`ConsumerLoop`].
pub struct ConsumerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<LoopState>,
}

impl ConsumerHandle {
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Request shutdown and wait for the current iteration to finish and the broker client
    /// to be closed.
    pub async fn stop(self) -> Result<(), ConsumerError> {
        self.shutdown.cancel();
        self.wait().await
    }

    /// Wait for the loop to exit, which only happens once its shutdown token is cancelled.
    pub async fn wait(self) -> Result<(), ConsumerError> {
        self.task.await?;
        Ok(())
    }
}
