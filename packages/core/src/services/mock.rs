//! In-memory stand-ins for Nightscout and Pushover, used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{NewTreatment, Treatment, ALERT_EVENT, CARB_EVENT, INSULIN_EVENT};
use crate::services::{Notifier, PushMessage, TreatmentQuery, TreatmentStore};

/// Treatments collection that applies `find[...]` filters like Nightscout.
#[derive(Default)]
pub struct MockTreatmentStore {
    rows: Mutex<Vec<Treatment>>,
    queries: Mutex<Vec<TreatmentQuery>>,
    created: Mutex<Vec<NewTreatment>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MockTreatmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_carbs(self, timestamp: &str, carbs: f64) -> Self {
        self.with_row(Treatment {
            timestamp: Some(timestamp.to_string()),
            event_type: Some(CARB_EVENT.to_string()),
            carbs: Some(carbs),
            ..Treatment::default()
        })
    }

    pub fn with_insulin(self, timestamp: &str) -> Self {
        self.with_row(Treatment {
            timestamp: Some(timestamp.to_string()),
            event_type: Some(INSULIN_EVENT.to_string()),
            insulin: Some(2.0),
            ..Treatment::default()
        })
    }

    pub fn with_alert(self, timestamp: &str, source_tag: &str) -> Self {
        self.with_row(Treatment {
            timestamp: Some(timestamp.to_string()),
            event_type: Some(ALERT_EVENT.to_string()),
            entered_by: Some(source_tag.to_string()),
            ..Treatment::default()
        })
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    fn with_row(self, row: Treatment) -> Self {
        self.rows.lock().unwrap().push(row);
        self
    }

    /// Number of queries issued for `event_type`.
    pub fn fetches_for(&self, event_type: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| {
                q.params()
                    .iter()
                    .any(|(k, v)| k == "find[eventType]" && v == event_type)
            })
            .count()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn created(&self) -> Vec<NewTreatment> {
        self.created.lock().unwrap().clone()
    }
}

fn row_matches(row: &Treatment, key: &str, value: &str) -> bool {
    match key {
        "find[eventType]" => row.event_type.as_deref() == Some(value),
        "find[enteredBy]" => row.entered_by.as_deref() == Some(value),
        "find[carbs][$gt]" => {
            let threshold: f64 = value.parse().unwrap_or(0.0);
            row.carbs.map_or(false, |carbs| carbs > threshold)
        }
        _ => true,
    }
}

#[async_trait]
impl TreatmentStore for MockTreatmentStore {
    async fn fetch_treatments(&self, query: &TreatmentQuery) -> Result<Vec<Treatment>, ServiceError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail_reads {
            return Err(ServiceError::Status {
                service: "Nightscout",
                status: 503,
            });
        }

        let params = query.params();
        let mut rows: Vec<Treatment> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| params.iter().all(|(k, v)| row_matches(row, k, v)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.raw_timestamp().cmp(&a.raw_timestamp()));
        rows.truncate(query.count() as usize);
        Ok(rows)
    }

    async fn create_treatment(&self, treatment: &NewTreatment) -> Result<(), ServiceError> {
        if self.fail_writes {
            return Err(ServiceError::network("connection reset"));
        }
        self.created.lock().unwrap().push(treatment.clone());
        self.rows.lock().unwrap().push(Treatment {
            timestamp: Some(treatment.timestamp.clone()),
            created_at: Some(treatment.created_at.clone()),
            event_type: Some(treatment.event_type.clone()),
            entered_by: Some(treatment.entered_by.clone()),
            notes: Some(treatment.notes.clone()),
            ..Treatment::default()
        });
        Ok(())
    }
}

/// Records every message instead of delivering it.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<PushMessage>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, message: &PushMessage) -> Result<(), ServiceError> {
        if self.fail {
            return Err(ServiceError::Status {
                service: "Pushover",
                status: 500,
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn notifier_name(&self) -> &str {
        "Mock"
    }
}
