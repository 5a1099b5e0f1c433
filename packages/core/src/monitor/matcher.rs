//! Missed-bolus matching.
//!
//! Carb entries are walked newest first. Each one is either still inside the
//! bolus window, beyond the lookback limit (which ends the walk), matched by
//! an insulin entry, or missed. The first missed entry ends the walk so a
//! single cycle raises at most one alert.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use crate::config::MonitorSettings;
use crate::models::{CarbEntry, InsulinEntry};

/// Result of evaluating one batch of carb entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// The carb entry to alert on, if any.
    pub missed: Option<CarbEntry>,
    pub too_recent: usize,
    pub matched: usize,
    /// Evaluation stopped at an entry older than the lookback limit.
    pub reached_lookback_limit: bool,
    pub insulin_fetched: bool,
}

/// Fetches a value on first use and keeps it for the rest of one evaluation.
struct Deferred<F, T> {
    fetch: Option<F>,
    value: Option<Vec<T>>,
}

impl<F, Fut, T> Deferred<F, T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Vec<T>>,
{
    fn new(fetch: F) -> Self {
        Self {
            fetch: Some(fetch),
            value: None,
        }
    }

    async fn get(&mut self) -> &[T] {
        if let Some(fetch) = self.fetch.take() {
            self.value = Some(fetch().await);
        }
        self.value.as_deref().unwrap_or(&[])
    }

    fn is_fetched(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matcher {
    bolus_window: Duration,
    lookback_limit: Duration,
}

impl Matcher {
    pub fn new(bolus_window: Duration, lookback_limit: Duration) -> Self {
        Self {
            bolus_window,
            lookback_limit,
        }
    }

    pub fn from_settings(settings: &MonitorSettings) -> Self {
        Self::new(settings.bolus_window, settings.lookback_limit)
    }

    /// A bolus may still arrive. Future-dated entries count as too recent.
    pub fn is_too_recent(&self, carb: &CarbEntry, now: DateTime<Utc>) -> bool {
        now - carb.timestamp <= self.bolus_window
    }

    pub fn is_too_old(&self, carb: &CarbEntry, now: DateTime<Utc>) -> bool {
        now - carb.timestamp > self.lookback_limit
    }

    /// Insulin delivered at or after the carbs, within the bolus window.
    pub fn covers(&self, carb: &CarbEntry, insulin: &InsulinEntry) -> bool {
        let delta = insulin.timestamp - carb.timestamp;
        delta >= Duration::zero() && delta <= self.bolus_window
    }

    /// Walk `carbs` (newest first) and find the first missed bolus.
    ///
    /// `fetch_insulin` runs at most once, and only if some entry is old enough
    /// to need it.
    pub async fn evaluate<F, Fut>(
        &self,
        carbs: &[CarbEntry],
        now: DateTime<Utc>,
        fetch_insulin: F,
    ) -> Evaluation
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<InsulinEntry>>,
    {
        let mut insulin = Deferred::new(fetch_insulin);
        let mut evaluation = Evaluation::default();

        for carb in carbs {
            tracing::debug!("Found {}g carbs at {}", carb.carbs, carb.raw_timestamp);

            if self.is_too_recent(carb, now) {
                evaluation.too_recent += 1;
                continue;
            }

            if self.is_too_old(carb, now) {
                tracing::debug!("Carbs at {} are past the lookback limit", carb.raw_timestamp);
                evaluation.reached_lookback_limit = true;
                break;
            }

            let matching = insulin
                .get()
                .await
                .iter()
                .find(|entry| self.covers(carb, entry))
                .cloned();

            if let Some(entry) = matching {
                tracing::debug!("Found matching insulin at {}", entry.timestamp);
                evaluation.matched += 1;
                continue;
            }

            tracing::warn!("Missed bolus detected for carb entry at {}", carb.raw_timestamp);
            evaluation.missed = Some(carb.clone());
            break;
        }

        evaluation.insulin_fetched = insulin.is_fetched();
        evaluation
    }
}
