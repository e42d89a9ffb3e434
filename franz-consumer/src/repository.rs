use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RepositoryError;

pub trait Identified {
    fn id(&self) -> i32;
}

/// Storage used by processors. Writes are upserts keyed by id, so storing the same entity
/// twice leaves the repository as if it had been stored once.
#[async_trait]
pub trait Repository<T>: Send + Sync {
    async fn upsert(&self, entity: T) -> Result<(), RepositoryError>;

    async fn get(&self, id: i32) -> Result<Option<T>, RepositoryError>;

    async fn count(&self) -> Result<usize, RepositoryError>;
}

pub struct InMemoryRepository<T> {
    entities: RwLock<HashMap<i32, T>>,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Repository<T> for InMemoryRepository<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    async fn upsert(&self, entity: T) -> Result<(), RepositoryError> {
        self.entities.write().await.insert(entity.id(), entity);
        Ok(())
    }

    async fn get(&self, id: i32) -> Result<Option<T>, RepositoryError> {
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.entities.read().await.len())
    }
}
