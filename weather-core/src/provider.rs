use crate::{
    Config,
    error::ProviderError,
    model::{Location, ProviderReport},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Upstream source of current conditions for a location.
#[async_trait]
pub trait UpstreamProvider: Send + Sync + Debug {
    async fn fetch(&self, location: &Location) -> Result<ProviderReport, ProviderError>;
}

/// Construct the upstream provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn UpstreamProvider>> {
    let api_key = config.provider_api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for the weather provider.\n\
                 Hint: run `weather configure` and enter your OpenWeatherMap API key."
        )
    })?;

    let provider = OpenWeatherProvider::builder(api_key.to_owned())
        .base_url(config.provider.base_url.clone())
        .units(config.provider.units.clone())
        .connect_timeout(config.provider.connect_timeout())
        .timeout(config.provider.timeout())
        .build()?;

    Ok(Box::new(provider))
}
