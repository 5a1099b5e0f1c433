//! Fetches typed entries from the treatments store.
//!
//! A failed request is logged and yields an empty list: one bad poll must not
//! stop the monitor, and the next cycle simply asks again.

use std::sync::Arc;

use crate::config::MonitorSettings;
use crate::error::ServiceError;
use crate::models::{AlertRecord, CarbEntry, InsulinEntry, Treatment, CARB_EVENT, INSULIN_EVENT};
use crate::services::{TreatmentQuery, TreatmentStore};

#[derive(Clone)]
pub struct Fetcher {
    store: Arc<dyn TreatmentStore + Send + Sync>,
    ignore_carbs: u32,
    carb_fetch_count: u32,
    insulin_fetch_count: u32,
    alert_history_count: u32,
    source_tag: String,
}

impl Fetcher {
    pub fn new(store: Arc<dyn TreatmentStore + Send + Sync>, settings: &MonitorSettings) -> Self {
        Self {
            store,
            ignore_carbs: settings.ignore_carbs,
            carb_fetch_count: settings.carb_fetch_count,
            insulin_fetch_count: settings.insulin_fetch_count,
            alert_history_count: settings.alert_history_count,
            source_tag: settings.source_tag.clone(),
        }
    }

    /// Run `query`, substituting an empty result on failure.
    pub async fn fetch(&self, query: &TreatmentQuery) -> Vec<Treatment> {
        match self.store.fetch_treatments(query).await {
            Ok(treatments) => treatments,
            Err(err) => {
                tracing::error!("Error fetching {:?}: {}", query.params(), err);
                Vec::new()
            }
        }
    }

    /// Carb entries above the ignore threshold, newest first.
    pub async fn carb_entries(&self) -> Vec<CarbEntry> {
        let query = TreatmentQuery::new(self.carb_fetch_count)
            .event_type(CARB_EVENT)
            .greater_than("carbs", self.ignore_carbs);

        let mut entries: Vec<CarbEntry> = convert(self.fetch(&query).await, "carb");
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub async fn insulin_entries(&self) -> Vec<InsulinEntry> {
        let query = TreatmentQuery::new(self.insulin_fetch_count).event_type(INSULIN_EVENT);
        convert(self.fetch(&query).await, "insulin")
    }

    /// The most recent alert records written by this monitor.
    pub async fn alert_records(&self) -> Vec<AlertRecord> {
        let query = TreatmentQuery::new(self.alert_history_count).entered_by(&self.source_tag);
        convert(self.fetch(&query).await, "alert record")
    }
}

/// Convert raw treatments, dropping (and logging) any that fail to parse.
fn convert<T>(treatments: Vec<Treatment>, kind: &str) -> Vec<T>
where
    T: TryFrom<Treatment, Error = ServiceError>,
{
    treatments
        .into_iter()
        .filter_map(|treatment| match T::try_from(treatment) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping malformed {} entry: {}", kind, err);
                None
            }
        })
        .collect()
}
