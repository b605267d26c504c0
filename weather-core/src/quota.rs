//! Per-credential hourly request quota.
//!
//! Windows roll over lazily: nothing sweeps expired counters, a window is
//! normalized the next time its credential is touched. `admit` only reads;
//! `record` performs the rollover and the increment as one store update under
//! a per-credential lock, and re-checks the limit so concurrent requests
//! (from this process or another one sharing the store) can never push a
//! window past it.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    clock::{Clock, hour_start},
    error::GateError,
    model::{QuotaStatus, QuotaWindow},
    store::QuotaStore,
};

#[derive(Debug)]
pub struct QuotaTracker {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    limit: u32,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>, limit: u32) -> Self {
        Self { store, clock, limit, locks: DashMap::new() }
    }

    /// Whether `credential` still has room in the current hour. Never writes.
    pub async fn admit(&self, credential: &str) -> Result<bool, GateError> {
        let now = self.clock.now();
        let window = self.store.load_window(credential).await?;
        Ok(effective_count(window.as_ref(), now) < self.limit)
    }

    /// Counts one request against `credential`, rolling the window over first
    /// if the hour has changed. Fails with `QuotaExceeded` when the window is
    /// already full, in which case the stored window is left unchanged.
    pub async fn record(&self, credential: &str) -> Result<QuotaWindow, GateError> {
        let lock = self.lock_for(credential);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let current = hour_start(now);
        let limit = self.limit;
        let owner = credential.to_owned();

        let written = self
            .store
            .update_window(
                credential,
                Box::new(move |stored| {
                    let mut window = stored.unwrap_or_else(|| QuotaWindow {
                        credential: owner,
                        request_count: 0,
                        window_start: current,
                        last_request: now,
                    });

                    if window.window_start < current {
                        window.request_count = 0;
                        window.window_start = current;
                    }

                    if window.request_count >= limit {
                        return None;
                    }

                    window.request_count += 1;
                    window.last_request = now;
                    Some(window)
                }),
            )
            .await?;

        written.ok_or_else(|| {
            tracing::debug!(credential, "quota filled concurrently");
            GateError::QuotaExceeded
        })
    }

    pub async fn status(&self, credential: &str) -> Result<QuotaStatus, GateError> {
        let now = self.clock.now();
        let window = self.store.load_window(credential).await?;
        let used = effective_count(window.as_ref(), now);
        let window_start = hour_start(now);

        Ok(QuotaStatus {
            credential: credential.to_owned(),
            used,
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            window_start,
            resets_at: window_start + Duration::hours(1),
        })
    }

    fn lock_for(&self, credential: &str) -> Arc<Mutex<()>> {
        self.locks.entry(credential.to_owned()).or_default().clone()
    }
}

/// Count that applies at `now`: a window from an earlier hour counts as empty.
fn effective_count(window: Option<&QuotaWindow>, now: DateTime<Utc>) -> u32 {
    match window {
        Some(w) if w.window_start >= hour_start(now) => w.request_count,
        _ => 0,
    }
}
