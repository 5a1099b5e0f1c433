//! Missed-bolus alert delivery.
//!
//! Before notifying, the alerter looks for one of its own alert records with
//! the carb entry's timestamp. After notifying it writes such a record, so a
//! carb entry is alerted on once even though every poll re-evaluates it.
//! Neither side effect is retried here; if the record write fails the next
//! cycle will alert again.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{CarbEntry, NewTreatment, ALERT_EVENT};
use crate::monitor::fetcher::Fetcher;
use crate::services::pushover::HIGH_PRIORITY;
use crate::services::{Notifier, PushMessage, TreatmentStore};

pub const ALERT_TITLE: &str = "Missed Bolus??";

/// What happened when an alert was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// An alert record for this carb entry already exists.
    AlreadyAlerted,
    /// Dry-run mode: nothing was sent or written.
    Suppressed,
    Sent { notified: bool, recorded: bool },
}

pub struct Alerter {
    fetcher: Fetcher,
    store: Arc<dyn TreatmentStore + Send + Sync>,
    notifier: Arc<dyn Notifier + Send + Sync>,
    source_tag: String,
    device: String,
    dry_run: bool,
}

impl Alerter {
    pub fn new(
        fetcher: Fetcher,
        store: Arc<dyn TreatmentStore + Send + Sync>,
        notifier: Arc<dyn Notifier + Send + Sync>,
        source_tag: impl Into<String>,
        device: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            source_tag: source_tag.into(),
            device: device.into(),
            dry_run,
        }
    }

    /// Alert on `carb` unless this monitor has already done so.
    pub async fn alert(&self, carb: &CarbEntry, now: DateTime<Utc>) -> AlertOutcome {
        if self.already_alerted(carb).await {
            tracing::info!("Already alerted for carbs at {}", carb.raw_timestamp);
            return AlertOutcome::AlreadyAlerted;
        }

        if self.dry_run {
            tracing::info!(
                "Dry run: would alert for {}g carbs at {}",
                carb.carbs,
                carb.raw_timestamp
            );
            return AlertOutcome::Suppressed;
        }

        let notified = self.notify(carb).await;
        let recorded = self.record(carb, now).await;

        AlertOutcome::Sent { notified, recorded }
    }

    async fn already_alerted(&self, carb: &CarbEntry) -> bool {
        self.fetcher
            .alert_records()
            .await
            .iter()
            .any(|record| record.source_tag == self.source_tag && record.timestamp == carb.timestamp)
    }

    async fn notify(&self, carb: &CarbEntry) -> bool {
        let message = push_message(carb);

        match self.notifier.send(&message).await {
            Ok(()) => {
                tracing::info!("Alert sent via {}: {}", self.notifier.notifier_name(), message.message);
                true
            }
            Err(err) => {
                // TODO: escalate priority when the same alert fails on consecutive cycles.
                tracing::error!(
                    "Failed to send alert via {}: {}",
                    self.notifier.notifier_name(),
                    err
                );
                false
            }
        }
    }

    async fn record(&self, carb: &CarbEntry, now: DateTime<Utc>) -> bool {
        let record = alert_record(carb, now, &self.source_tag, &self.device);

        match self.store.create_treatment(&record).await {
            Ok(()) => {
                tracing::info!("Nightscout alert recorded: {}", record.notes);
                true
            }
            Err(err) => {
                tracing::error!("Failed to record Nightscout alert: {}", err);
                false
            }
        }
    }
}

pub fn push_message(carb: &CarbEntry) -> PushMessage {
    PushMessage {
        title: ALERT_TITLE.to_string(),
        message: format!(
            "Missed bolus for {}g carbs at {}?",
            carb.carbs, carb.raw_timestamp
        ),
        priority: HIGH_PRIORITY,
    }
}

pub fn alert_record(
    carb: &CarbEntry,
    now: DateTime<Utc>,
    source_tag: &str,
    device: &str,
) -> NewTreatment {
    NewTreatment {
        entered_by: source_tag.to_string(),
        event_type: ALERT_EVENT.to_string(),
        notes: format!(
            "Missed bolus for {}g carbs at {} UTC",
            carb.carbs, carb.raw_timestamp
        ),
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        timestamp: carb.raw_timestamp.clone(),
        device: device.to_string(),
    }
}
