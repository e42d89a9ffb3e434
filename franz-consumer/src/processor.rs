use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{DispatchErrorKind, ProcessingError};

/// Business processing for a single entity type.
///
/// A processor only ever sees already deserialized entities of its declared type, never raw
/// envelopes. Messages are delivered at least once, so `process` must tolerate seeing the
/// same entity again (upserts rather than inserts). Dependencies such as repositories are
/// injected at construction; no state is kept between invocations.
#[async_trait]
pub trait Processor: Send + Sync {
    type Entity: DeserializeOwned + Send + 'static;

    /// The type tag this processor is registered under.
    const ENTITY_TYPE: &'static str;

    async fn process(&self, entity: Self::Entity) -> Result<(), ProcessingError>;
}

/// Object-safe view over a [`Processor`], so processors of different entity types can live in
/// the same registry. Deserializing the body happens here, before the typed processor is
/// reached.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    fn entity_type(&self) -> &'static str;

    async fn process_body(&self, body: &[u8]) -> Result<(), DispatchErrorKind>;
}

pub(crate) struct Typed<P> {
    processor: P,
}

impl<P: Processor> Typed<P> {
    pub(crate) fn new(processor: P) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl<P: Processor> MessageProcessor for Typed<P> {
    fn entity_type(&self) -> &'static str {
        P::ENTITY_TYPE
    }

    async fn process_body(&self, body: &[u8]) -> Result<(), DispatchErrorKind> {
        let entity = deserialize::<P::Entity>(P::ENTITY_TYPE, body)?;
        self.processor.process(entity).await?;
        Ok(())
    }
}

fn deserialize<T: DeserializeOwned>(
    entity_type: &'static str,
    body: &[u8],
) -> Result<T, DispatchErrorKind> {
    serde_json::from_slice(body)
        .map_err(|error| DispatchErrorKind::MalformedPayload { entity_type, error })
}
