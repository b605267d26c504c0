use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::{
    error::StoreError,
    model::{Location, Observation},
    store::ObservationStore,
};

/// Most-recent-observation lookup plus the freshness rule applied to it.
#[derive(Debug, Clone)]
pub struct FreshnessCache {
    store: Arc<dyn ObservationStore>,
    window: Duration,
}

impl FreshnessCache {
    pub fn new(store: Arc<dyn ObservationStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Latest stored observation for the location, fresh or not.
    pub async fn lookup(&self, city: &str, country: &str) -> Result<Option<Observation>, StoreError> {
        self.store.latest_for_location(&Location::new(city, country)).await
    }

    /// Strict: an observation exactly `window` old is stale.
    pub fn is_fresh(&self, observation: &Observation, now: DateTime<Utc>) -> bool {
        now - observation.observed_at < self.window
    }
}
