use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format used for `WeatherView::observed_at`.
pub const OBSERVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A (city, country) pair. Compared case-insensitively, stored as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self { city: city.into(), country: country.into() }
    }

    /// Normalized key used for lookups, e.g. `"london,gb"`.
    pub fn key(&self) -> String {
        format!("{},{}", self.city.trim().to_lowercase(), self.country.trim().to_lowercase())
    }

    pub fn matches(&self, other: &Location) -> bool {
        self.key() == other.key()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Location {}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// One weather condition as reported by the upstream provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub code: String,
    pub category: String,
    pub description: String,
    pub icon: String,
}

impl Condition {
    pub fn is_well_formed(&self) -> bool {
        !self.code.trim().is_empty() && !self.category.trim().is_empty()
    }
}

/// Normalized result of an upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReport {
    /// Status code carried in the payload itself, if the provider reports one.
    pub status: Option<u16>,
    pub conditions: Vec<Condition>,
}

/// One persisted weather reading. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub location: Location,
    pub condition: Condition,
    /// Credential whose request triggered the fetch.
    pub credential: String,
    pub observed_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        location: Location,
        condition: Condition,
        credential: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self { location, condition, credential: credential.into(), observed_at: now, stored_at: now }
    }
}

/// Usage of one credential inside the current hour bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaWindow {
    pub credential: String,
    pub request_count: u32,
    /// Always on an hour boundary.
    pub window_start: DateTime<Utc>,
    pub last_request: DateTime<Utc>,
}

/// Read-only snapshot of a credential's quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub credential: String,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub window_start: DateTime<Utc>,
    pub resets_at: DateTime<Utc>,
}

/// Response shape handed to the caller of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherView {
    pub condition_id: String,
    pub category: String,
    pub description: String,
    pub icon: String,
    pub city: String,
    pub country: String,
    pub credential: String,
    pub observed_at: String,
}

impl From<&Observation> for WeatherView {
    fn from(obs: &Observation) -> Self {
        Self {
            condition_id: obs.condition.code.clone(),
            category: obs.condition.category.clone(),
            description: obs.condition.description.clone(),
            icon: obs.condition.icon.clone(),
            city: obs.location.city.clone(),
            country: obs.location.country.clone(),
            credential: obs.credential.clone(),
            observed_at: obs.observed_at.format(OBSERVED_AT_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn location_compares_case_insensitively() {
        let a = Location::new("London", "GB");
        let b = Location::new(" london", "gb ");
        assert_eq!(a, b);
        assert_eq!(a.key(), "london,gb");
        assert_ne!(a, Location::new("Paris", "FR"));
    }

    #[test]
    fn view_keeps_stored_spelling_and_formats_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 8, 8, 14, 5, 9).unwrap();
        let obs = Observation::new(
            Location::new("Melbourne", "AU"),
            Condition {
                code: "803".into(),
                category: "Clouds".into(),
                description: "broken clouds".into(),
                icon: "04d".into(),
            },
            "K1",
            at,
        );

        let view = WeatherView::from(&obs);
        assert_eq!(view.city, "Melbourne");
        assert_eq!(view.country, "AU");
        assert_eq!(view.observed_at, "2025-08-08 14:05:09");
    }

    #[test]
    fn view_serializes_camel_case() {
        let at = Utc.with_ymd_and_hms(2025, 8, 8, 0, 0, 0).unwrap();
        let obs = Observation::new(
            Location::new("Oslo", "NO"),
            Condition {
                code: "800".into(),
                category: "Clear".into(),
                description: "clear sky".into(),
                icon: "01n".into(),
            },
            "K1",
            at,
        );

        let json = serde_json::to_value(WeatherView::from(&obs)).unwrap();
        assert_eq!(json["conditionId"], "800");
        assert_eq!(json["observedAt"], "2025-08-08 00:00:00");
    }

    #[test]
    fn blank_code_is_malformed() {
        let c = Condition {
            code: " ".into(),
            category: "Rain".into(),
            description: String::new(),
            icon: String::new(),
        };
        assert!(!c.is_well_formed());
    }
}
