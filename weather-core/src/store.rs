use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug};

use crate::{
    error::StoreError,
    model::{Location, Observation, QuotaWindow},
};

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Append-only log of observations.
#[async_trait]
pub trait ObservationStore: Send + Sync + Debug {
    async fn append(&self, observation: &Observation) -> Result<(), StoreError>;

    /// Observation with the greatest `observed_at` for the location.
    async fn latest_for_location(&self, location: &Location)
    -> Result<Option<Observation>, StoreError>;

    /// Newest first.
    async fn list_for_location(&self, location: &Location) -> Result<Vec<Observation>, StoreError>;

    /// Newest first.
    async fn list_for_credential(&self, credential: &str) -> Result<Vec<Observation>, StoreError>;
}

/// Read-modify-write step applied to one credential's window. Returning
/// `None` leaves the stored window untouched.
pub type WindowUpdate = Box<dyn FnOnce(Option<QuotaWindow>) -> Option<QuotaWindow> + Send>;

/// Keyed quota windows, one per credential.
#[async_trait]
pub trait QuotaStore: Send + Sync + Debug {
    async fn load_window(&self, credential: &str) -> Result<Option<QuotaWindow>, StoreError>;

    async fn save_window(&self, window: &QuotaWindow) -> Result<(), StoreError>;

    /// Applies `update` to the stored window and persists the result,
    /// returning what was written.
    ///
    /// The default is a plain load followed by a save and is only atomic
    /// against callers that serialize on the credential themselves. Stores
    /// shared between processes override it.
    async fn update_window(
        &self,
        credential: &str,
        update: WindowUpdate,
    ) -> Result<Option<QuotaWindow>, StoreError> {
        let current = self.load_window(credential).await?;
        match update(current) {
            Some(next) => {
                self.save_window(&next).await?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }
}

/// Plain data shared by the in-memory and file-backed stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default)]
    observations: Vec<Observation>,
    #[serde(default)]
    quotas: HashMap<String, QuotaWindow>,
}

impl Snapshot {
    fn append(&mut self, observation: &Observation) {
        self.observations.push(observation.clone());
    }

    fn latest_for_location(&self, location: &Location) -> Option<Observation> {
        // `max_by_key` keeps the last maximum, so a later append wins a tie.
        self.observations
            .iter()
            .filter(|o| o.location.matches(location))
            .max_by_key(|o| o.observed_at)
            .cloned()
    }

    fn list_where(&self, pred: impl Fn(&Observation) -> bool) -> Vec<Observation> {
        let mut found: Vec<Observation> =
            self.observations.iter().filter(|o| pred(o)).cloned().collect();
        found.reverse();
        found.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        found
    }

    fn list_for_location(&self, location: &Location) -> Vec<Observation> {
        self.list_where(|o| o.location.matches(location))
    }

    fn list_for_credential(&self, credential: &str) -> Vec<Observation> {
        self.list_where(|o| o.credential == credential)
    }

    fn load_window(&self, credential: &str) -> Option<QuotaWindow> {
        self.quotas.get(credential).cloned()
    }

    fn save_window(&mut self, window: &QuotaWindow) {
        self.quotas.insert(window.credential.clone(), window.clone());
    }

    fn update_window(&mut self, credential: &str, update: WindowUpdate) -> Option<QuotaWindow> {
        let next = update(self.load_window(credential))?;
        self.save_window(&next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Condition;
    use chrono::{Duration, TimeZone, Utc};

    fn obs(city: &str, key: &str, minutes: i64, code: &str) -> Observation {
        let base = Utc.with_ymd_and_hms(2025, 8, 8, 12, 0, 0).unwrap();
        Observation::new(
            Location::new(city, "GB"),
            Condition {
                code: code.into(),
                category: "Clouds".into(),
                description: "few clouds".into(),
                icon: "02d".into(),
            },
            key,
            base + Duration::minutes(minutes),
        )
    }

    #[test]
    fn latest_picks_max_observed_at_not_last_append() {
        let mut s = Snapshot::default();
        s.append(&obs("London", "K1", 30, "new"));
        s.append(&obs("London", "K1", 0, "old"));

        let latest = s.latest_for_location(&Location::new("LONDON", "gb")).unwrap();
        assert_eq!(latest.condition.code, "new");
    }

    #[test]
    fn latest_tie_goes_to_later_append() {
        let mut s = Snapshot::default();
        s.append(&obs("London", "K1", 0, "first"));
        s.append(&obs("London", "K2", 0, "second"));

        let latest = s.latest_for_location(&Location::new("London", "GB")).unwrap();
        assert_eq!(latest.condition.code, "second");
    }

    #[test]
    fn lists_are_newest_first() {
        let mut s = Snapshot::default();
        s.append(&obs("London", "K1", 0, "a"));
        s.append(&obs("Leeds", "K1", 10, "b"));
        s.append(&obs("London", "K2", 20, "c"));

        let codes: Vec<_> = s
            .list_for_location(&Location::new("london", "GB"))
            .into_iter()
            .map(|o| o.condition.code)
            .collect();
        assert_eq!(codes, ["c", "a"]);

        let codes: Vec<_> =
            s.list_for_credential("K1").into_iter().map(|o| o.condition.code).collect();
        assert_eq!(codes, ["b", "a"]);
    }
}
