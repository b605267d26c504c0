//! Core library for the weather gate.
//!
//! This crate defines:
//! - Credential allow-listing and per-credential hourly quotas
//! - A freshness cache over stored observations
//! - The gate that combines them with an upstream weather provider
//! - Configuration, stores, and the OpenWeatherMap provider
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod model;
pub mod provider;
pub mod quota;
pub mod store;

pub use cache::FreshnessCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccessConfig, CacheConfig, Config, ProviderConfig, StorageConfig};
pub use credentials::CredentialValidator;
pub use error::{GateError, ProviderError, StoreError};
pub use gate::{Resolution, WeatherGate};
pub use model::{Condition, Location, Observation, ProviderReport, QuotaStatus, QuotaWindow, WeatherView};
pub use provider::{UpstreamProvider, provider_from_config};
pub use quota::QuotaTracker;
pub use store::{FileStore, MemoryStore, ObservationStore, QuotaStore, WindowUpdate};
