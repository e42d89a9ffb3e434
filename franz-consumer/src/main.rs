//! Consume library entities from Kafka and store them.
use std::sync::Arc;

use axum::{routing::get, Router};
use envconfig::Envconfig;
use eyre::{Result, WrapErr};
use futures::future::{select, Either};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use franz_common::health::HealthRegistry;
use franz_common::metrics::{serve, setup_metrics_routes};
use franz_consumer::broker::KafkaBroker;
use franz_consumer::config::Config;
use franz_consumer::consumer::ConsumerLoop;
use franz_consumer::dead_letter::KafkaDeadLetterSink;
use franz_consumer::dispatch::DispatchHandler;
use franz_consumer::error::ConsumerError;
use franz_consumer::library;
use franz_consumer::registry::ProcessorRegistry;
use franz_consumer::repository::InMemoryRepository;

async fn index() -> &'static str {
    "franz consumer"
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::init_from_env().wrap_err("failed to load configuration from env")?;
    config.validate()?;
    let topic = config.topic()?;

    let mut registry = ProcessorRegistry::new();
    library::register(
        &mut registry,
        Arc::new(InMemoryRepository::<library::Book>::new()),
        Arc::new(InMemoryRepository::<library::Member>::new()),
    )?;
    let dispatcher = DispatchHandler::new(Arc::new(registry), config.entity_type_header.as_str());

    let liveness = HealthRegistry::new("liveness");
    let consumer_liveness = liveness.register(
        "consumer".to_owned(),
        time::Duration::try_from(config.liveness_deadline.0)?,
    );

    let broker = KafkaBroker::new(&config.kafka).map_err(ConsumerError::Client)?;
    let mut consumer = ConsumerLoop::new(
        broker,
        &topic,
        config.poll_timeout.0,
        dispatcher,
        consumer_liveness,
    );
    if let Some(dead_letter_topic) = &config.dead_letter_topic {
        info!(topic = dead_letter_topic.as_str(), "dead lettering poison messages");
        let sink = KafkaDeadLetterSink::new(&config.kafka, dead_letter_topic.as_str())?;
        consumer = consumer.with_dead_letter(Arc::new(sink));
    }

    let router = Router::new()
        .route("/", get(index))
        .route("/_liveness", get(move || std::future::ready(liveness.get_status())));
    let router = setup_metrics_routes(router)?;

    let shutdown = CancellationToken::new();
    let handle = consumer.start(shutdown.clone()).await?;
    info!(%topic, group = %config.kafka.kafka_consumer_group, "consumer started");

    let bind = config.bind();
    let http_server = Box::pin(serve(router, &bind));
    let signal = Box::pin(tokio::signal::ctrl_c());

    match select(http_server, signal).await {
        Either::Left((Err(e), _)) => error!("failed to serve http on {}: {}", bind, e),
        Either::Left((Ok(()), _)) => error!("http server exited"),
        Either::Right((Err(e), _)) => error!("failed to listen for shutdown signal: {}", e),
        Either::Right((Ok(()), _)) => info!("received shutdown signal"),
    }

    handle.stop().await?;
    Ok(())
}
