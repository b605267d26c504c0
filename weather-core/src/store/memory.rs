use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ObservationStore, QuotaStore, Snapshot, WindowUpdate};
use crate::{
    error::StoreError,
    model::{Location, Observation, QuotaWindow},
};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn append(&self, observation: &Observation) -> Result<(), StoreError> {
        self.inner.write().await.append(observation);
        Ok(())
    }

    async fn latest_for_location(
        &self,
        location: &Location,
    ) -> Result<Option<Observation>, StoreError> {
        Ok(self.inner.read().await.latest_for_location(location))
    }

    async fn list_for_location(&self, location: &Location) -> Result<Vec<Observation>, StoreError> {
        Ok(self.inner.read().await.list_for_location(location))
    }

    async fn list_for_credential(&self, credential: &str) -> Result<Vec<Observation>, StoreError> {
        Ok(self.inner.read().await.list_for_credential(credential))
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    async fn load_window(&self, credential: &str) -> Result<Option<QuotaWindow>, StoreError> {
        Ok(self.inner.read().await.load_window(credential))
    }

    async fn save_window(&self, window: &QuotaWindow) -> Result<(), StoreError> {
        self.inner.write().await.save_window(window);
        Ok(())
    }

    async fn update_window(
        &self,
        credential: &str,
        update: WindowUpdate,
    ) -> Result<Option<QuotaWindow>, StoreError> {
        Ok(self.inner.write().await.update_window(credential, update))
    }
}
