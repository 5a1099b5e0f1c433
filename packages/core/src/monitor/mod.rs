//! Bolus monitor: fetch carb entries, match them against insulin, alert on
//! the first missed bolus.

pub mod alerter;
pub mod fetcher;
pub mod matcher;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::MonitorSettings;
use crate::services::{Notifier, TreatmentStore};

pub use alerter::{AlertOutcome, Alerter};
pub use fetcher::Fetcher;
pub use matcher::{Evaluation, Matcher};

/// Summary of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub carb_entries: usize,
    pub evaluation: Evaluation,
    pub alert: Option<AlertOutcome>,
}

pub struct BolusMonitor {
    fetcher: Fetcher,
    matcher: Matcher,
    alerter: Alerter,
}

impl BolusMonitor {
    pub fn new(
        settings: &MonitorSettings,
        device: impl Into<String>,
        store: Arc<dyn TreatmentStore + Send + Sync>,
        notifier: Arc<dyn Notifier + Send + Sync>,
    ) -> Self {
        let fetcher = Fetcher::new(store.clone(), settings);
        let alerter = Alerter::new(
            fetcher.clone(),
            store,
            notifier,
            settings.source_tag.clone(),
            device,
            settings.dry_run,
        );

        Self {
            fetcher,
            matcher: Matcher::from_settings(settings),
            alerter,
        }
    }

    /// Run one cycle against the current time.
    pub async fn poll_once(&self) -> CycleReport {
        self.poll_at(Utc::now()).await
    }

    /// Run one cycle as if the time were `now`.
    pub async fn poll_at(&self, now: DateTime<Utc>) -> CycleReport {
        let carbs = self.fetcher.carb_entries().await;

        if carbs.is_empty() {
            tracing::info!("No carb entries to evaluate this cycle");
        } else {
            tracing::debug!("Evaluating {} carb entries", carbs.len());
        }

        let fetcher = &self.fetcher;
        let evaluation = self
            .matcher
            .evaluate(&carbs, now, move || fetcher.insulin_entries())
            .await;

        let alert = match &evaluation.missed {
            Some(carb) => Some(self.alerter.alert(carb, now).await),
            None => None,
        };

        CycleReport {
            carb_entries: carbs.len(),
            evaluation,
            alert,
        }
    }
}
