//! The weather gate: credential check, quota admission, cache-or-fetch,
//! persistence and quota recording for one request.

use std::{sync::Arc, time::Duration};

use crate::{
    Config,
    cache::FreshnessCache,
    clock::Clock,
    credentials::CredentialValidator,
    error::{GateError, ProviderError},
    model::{Location, Observation, QuotaStatus, WeatherView},
    provider::UpstreamProvider,
    quota::QuotaTracker,
    store::{ObservationStore, QuotaStore},
};

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Cache,
    Upstream,
}

#[derive(Debug)]
pub struct WeatherGate {
    validator: CredentialValidator,
    quota: QuotaTracker,
    cache: FreshnessCache,
    /// `None` when no upstream is configured; only fresh cache hits can be served then.
    provider: Option<Box<dyn UpstreamProvider>>,
    observations: Arc<dyn ObservationStore>,
    clock: Arc<dyn Clock>,
    upstream_timeout: Duration,
}

impl WeatherGate {
    pub fn new(
        validator: CredentialValidator,
        quota: QuotaTracker,
        cache: FreshnessCache,
        provider: Option<Box<dyn UpstreamProvider>>,
        observations: Arc<dyn ObservationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            validator,
            quota,
            cache,
            provider,
            observations,
            clock,
            upstream_timeout: Duration::from_secs(30),
        }
    }

    /// Wire a gate from configuration over one store serving both observations and quotas.
    pub fn from_config<S>(
        config: &Config,
        provider: Option<Box<dyn UpstreamProvider>>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: ObservationStore + QuotaStore + 'static,
    {
        let validator = CredentialValidator::new(config.access.api_keys.iter().cloned());
        if validator.is_empty() {
            tracing::warn!("no access keys configured, every request will be rejected");
        }
        let quota = QuotaTracker::new(store.clone(), clock.clone(), config.access.requests_per_hour);
        let cache = FreshnessCache::new(store.clone(), config.cache.freshness_window());

        Self::new(validator, quota, cache, provider, store, clock)
            .with_upstream_timeout(config.provider.timeout())
    }

    /// Upper bound on a single upstream call; running out counts as unavailable.
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Current weather for a location on behalf of `credential`.
    pub async fn get_weather(
        &self,
        city: &str,
        country: &str,
        credential: &str,
    ) -> Result<WeatherView, GateError> {
        self.resolve(city, country, credential).await.map(|(view, _)| view)
    }

    /// Like [`get_weather`](Self::get_weather), also reporting where the answer came from.
    pub async fn resolve(
        &self,
        city: &str,
        country: &str,
        credential: &str,
    ) -> Result<(WeatherView, Resolution), GateError> {
        if !self.validator.is_valid(credential) {
            tracing::debug!(city, country, "rejected unknown credential");
            return Err(GateError::InvalidCredential);
        }

        if !self.quota.admit(credential).await? {
            tracing::info!(credential, "hourly quota exhausted");
            return Err(GateError::QuotaExceeded);
        }

        let (observation, resolution) = match self.cache.lookup(city, country).await? {
            Some(hit) if self.cache.is_fresh(&hit, self.clock.now()) => {
                tracing::debug!(city, country, observed_at = %hit.observed_at, "served from cache");
                (hit, Resolution::Cache)
            }
            _ => (self.fetch_and_store(city, country, credential).await?, Resolution::Upstream),
        };

        // A store failure here leaves the observation written but the request
        // uncounted; it is surfaced rather than compensated.
        self.quota.record(credential).await?;

        Ok((WeatherView::from(&observation), resolution))
    }

    async fn fetch_and_store(
        &self,
        city: &str,
        country: &str,
        credential: &str,
    ) -> Result<Observation, GateError> {
        let location = Location::new(city, country);

        let Some(provider) = self.provider.as_deref() else {
            tracing::warn!(location = %location, "cache miss and no weather provider configured");
            return Err(GateError::UpstreamUnavailable);
        };

        let report = tokio::time::timeout(self.upstream_timeout, provider.fetch(&location))
            .await
            .unwrap_or(Err(ProviderError::Timeout))
            .map_err(|e| {
                tracing::warn!(location = %location, error = %e, "upstream fetch failed");
                GateError::from(e)
            })?;

        if let Some(status) = report.status.filter(|s| *s != 200) {
            tracing::warn!(location = %location, status, "upstream payload reported failure");
            return Err(GateError::UpstreamDataInvalid);
        }

        let condition = match report.conditions.into_iter().next() {
            Some(c) if c.is_well_formed() => c,
            _ => {
                tracing::warn!(location = %location, "upstream returned no usable condition");
                return Err(GateError::UpstreamDataInvalid);
            }
        };

        let observation = Observation::new(location, condition, credential, self.clock.now());
        self.observations.append(&observation).await?;

        tracing::info!(
            location = %observation.location,
            category = %observation.condition.category,
            "stored new observation"
        );

        Ok(observation)
    }

    /// Every observation stored for the location, newest first.
    pub async fn history_for_location(
        &self,
        city: &str,
        country: &str,
    ) -> Result<Vec<WeatherView>, GateError> {
        let found = self.observations.list_for_location(&Location::new(city, country)).await?;
        Ok(found.iter().map(WeatherView::from).collect())
    }

    /// Every observation fetched on behalf of `credential`, newest first.
    pub async fn history_for_credential(
        &self,
        credential: &str,
    ) -> Result<Vec<WeatherView>, GateError> {
        let found = self.observations.list_for_credential(credential).await?;
        Ok(found.iter().map(WeatherView::from).collect())
    }

    pub async fn quota_status(&self, credential: &str) -> Result<QuotaStatus, GateError> {
        if !self.validator.is_valid(credential) {
            return Err(GateError::InvalidCredential);
        }
        self.quota.status(credential).await
    }
}
