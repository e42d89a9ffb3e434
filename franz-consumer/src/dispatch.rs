use std::sync::Arc;
use std::time::Instant;

use franz_common::Envelope;
use tracing::debug;

use crate::error::{DispatchError, DispatchErrorKind};
use crate::metrics_consts::PROCESSING_TIME;
use crate::registry::ProcessorRegistry;

/// Routes envelopes to the processor registered for their type tag.
///
/// Every step before invoking the processor (reading the tag, resolving the processor,
/// deserializing the body) is free of side effects, so a failure there never leaves a
/// half-processed message behind. Failures are returned, never swallowed: the consumer loop
/// decides what happens to the offset.
#[derive(Clone)]
pub struct DispatchHandler {
    registry: Arc<ProcessorRegistry>,
    entity_type_header: String,
}

impl DispatchHandler {
    pub fn new(registry: Arc<ProcessorRegistry>, entity_type_header: &str) -> Self {
        Self {
            registry,
            entity_type_header: entity_type_header.to_owned(),
        }
    }

    /// The type tag of `envelope`, if it carries one.
    pub fn entity_type<'e>(&self, envelope: &'e Envelope) -> Option<&'e str> {
        envelope.headers().get(&self.entity_type_header)
    }

    /// Dispatch `envelope` to its processor, returning the resolved entity type on success.
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<&'static str, DispatchError> {
        let error = |entity_type: Option<&str>, kind| DispatchError {
            key: envelope.key().to_owned(),
            entity_type: entity_type.map(str::to_owned),
            kind,
        };

        let Some(tag) = self.entity_type(envelope) else {
            return Err(error(
                None,
                DispatchErrorKind::MissingRoutingMetadata(self.entity_type_header.clone()),
            ));
        };

        let Some(processor) = self.registry.resolve(tag) else {
            return Err(error(
                Some(tag),
                DispatchErrorKind::UnknownMessageType(tag.to_owned()),
            ));
        };

        let entity_type = processor.entity_type();
        debug!(key = envelope.key(), entity_type, "dispatching message");

        let start = Instant::now();
        let result = processor.process_body(envelope.body()).await;
        metrics::histogram!(PROCESSING_TIME, "entity_type" => entity_type)
            .record(start.elapsed().as_secs_f64());

        result.map_err(|kind| error(Some(tag), kind))?;
        Ok(entity_type)
    }
}
