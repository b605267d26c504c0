use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::ProviderError,
    model::{Condition, Location, ProviderReport},
};

use super::UpstreamProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Current-weather client for the OpenWeatherMap API.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    units: String,
    http: Client,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherBuilder {
    api_key: String,
    base_url: String,
    units: String,
    connect_timeout: Duration,
    timeout: Duration,
}

impl OpenWeatherBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenWeatherProvider, ProviderError> {
        let http = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(OpenWeatherProvider {
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            units: self.units,
            http,
        })
    }
}

impl OpenWeatherProvider {
    pub fn builder(api_key: String) -> OpenWeatherBuilder {
        OpenWeatherBuilder {
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            units: "metric".to_owned(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Self::builder(api_key).build()
    }
}

#[async_trait]
impl UpstreamProvider for OpenWeatherProvider {
    async fn fetch(&self, location: &Location) -> Result<ProviderReport, ProviderError> {
        let url = format!("{}/weather", self.base_url);
        let query = format!("{},{}", location.city.trim(), location.country.trim());

        tracing::info!(location = %location, "requesting current weather from OpenWeatherMap");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()
            .await
            .map_err(classify)?;

        let status = res.status();
        let body = res.text().await.map_err(classify)?;

        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), body: truncate_body(&body) });
        }

        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(parsed.into_report())
    }
}

fn classify(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() { ProviderError::Timeout } else { ProviderError::Network(err) }
}

/// OpenWeatherMap sends some identifiers as numbers and some as strings,
/// depending on the endpoint and on whether the call failed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(i64),
    Str(String),
}

impl NumOrString {
    fn into_string(self) -> String {
        match self {
            NumOrString::Num(n) => n.to_string(),
            NumOrString::Str(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: NumOrString,
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    cod: Option<NumOrString>,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

impl OwCurrentResponse {
    fn into_report(self) -> ProviderReport {
        let status = self.cod.and_then(|c| c.into_string().parse::<u16>().ok());

        let conditions = self
            .weather
            .into_iter()
            .map(|w| Condition {
                code: w.id.into_string(),
                category: w.main,
                description: w.description,
                icon: w.icon,
            })
            .collect();

        ProviderReport { status, conditions }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
