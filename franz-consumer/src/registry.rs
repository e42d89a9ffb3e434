use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::processor::{MessageProcessor, Processor, Typed};

/// Maps type tags to the processor handling them.
///
/// The registry is filled once at startup and is read-only afterwards; share it behind an
/// `Arc` between as many consumer loops as needed. Duplicate tags are rejected while
/// registering, so a misconfiguration stops the process before any message is consumed.
/// An empty registry is valid: every lookup simply misses.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn MessageProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` under its declared entity type.
    pub fn register<P>(&mut self, processor: P) -> Result<&mut Self, RegistryError>
    where
        P: Processor + 'static,
    {
        let processor: Arc<dyn MessageProcessor> = Arc::new(Typed::new(processor));
        self.insert(P::ENTITY_TYPE.to_owned(), processor)
    }

    /// Make `alias` resolve to the processor already registered under `tag`, e.g. to accept
    /// fully-qualified type names from older producers.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        tag: &str,
    ) -> Result<&mut Self, RegistryError> {
        let alias = alias.into();
        let processor = self
            .processors
            .get(tag)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTarget {
                alias: alias.clone(),
                target: tag.to_owned(),
            })?;
        self.insert(alias, processor)
    }

    fn insert(
        &mut self,
        tag: String,
        processor: Arc<dyn MessageProcessor>,
    ) -> Result<&mut Self, RegistryError> {
        if self.processors.contains_key(&tag) {
            return Err(RegistryError::Duplicate(tag));
        }
        self.processors.insert(tag, processor);
        Ok(self)
    }

    /// Case-sensitive lookup of the processor for `tag`.
    pub fn resolve(&self, tag: &str) -> Option<Arc<dyn MessageProcessor>> {
        self.processors.get(tag).cloned()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
