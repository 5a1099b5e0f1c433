//! Nightscout treatment records and the typed entries the monitor works on.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Nightscout `eventType` for logged carbohydrates.
pub const CARB_EVENT: &str = "Carb Correction";
/// Nightscout `eventType` for logged insulin.
pub const INSULIN_EVENT: &str = "Correction Bolus";
/// Nightscout `eventType` used for this monitor's alert records.
pub const ALERT_EVENT: &str = "Question";

/// A treatment as returned by `GET /treatments.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub timestamp: Option<String>,
    #[serde(rename = "created_at")]
    pub created_at: Option<String>,
    pub event_type: Option<String>,
    pub entered_by: Option<String>,
    pub carbs: Option<f64>,
    pub insulin: Option<f64>,
    pub notes: Option<String>,
}

impl Treatment {
    /// The entry's own time, falling back to `created_at`.
    pub fn raw_timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref().or(self.created_at.as_deref())
    }
}

/// A treatment written back to Nightscout by `POST /treatments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTreatment {
    #[serde(rename = "enteredBy")]
    pub entered_by: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub notes: String,
    pub created_at: String,
    pub timestamp: String,
    pub device: String,
}

/// A logged carbohydrate intake.
#[derive(Debug, Clone, PartialEq)]
pub struct CarbEntry {
    pub timestamp: DateTime<Utc>,
    /// Timestamp exactly as Nightscout reported it.
    pub raw_timestamp: String,
    pub carbs: f64,
}

/// A logged insulin delivery. The amount is informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct InsulinEntry {
    pub timestamp: DateTime<Utc>,
    pub amount: Option<f64>,
}

/// Marker left in Nightscout after an alert has been sent for a carb entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub source_tag: String,
}

impl TryFrom<Treatment> for CarbEntry {
    type Error = ServiceError;

    fn try_from(treatment: Treatment) -> Result<Self, Self::Error> {
        let raw = treatment
            .raw_timestamp()
            .ok_or_else(|| ServiceError::format("carb entry has no timestamp"))?
            .to_string();
        Ok(CarbEntry {
            timestamp: parse_timestamp(&raw)?,
            raw_timestamp: raw,
            carbs: treatment.carbs.unwrap_or_default(),
        })
    }
}

impl TryFrom<Treatment> for InsulinEntry {
    type Error = ServiceError;

    fn try_from(treatment: Treatment) -> Result<Self, Self::Error> {
        let raw = treatment
            .raw_timestamp()
            .ok_or_else(|| ServiceError::format("insulin entry has no timestamp"))?;
        Ok(InsulinEntry {
            timestamp: parse_timestamp(raw)?,
            amount: treatment.insulin,
        })
    }
}

impl TryFrom<Treatment> for AlertRecord {
    type Error = ServiceError;

    fn try_from(treatment: Treatment) -> Result<Self, Self::Error> {
        let raw = treatment
            .raw_timestamp()
            .ok_or_else(|| ServiceError::format("alert record has no timestamp"))?;
        Ok(AlertRecord {
            timestamp: parse_timestamp(raw)?,
            source_tag: treatment.entered_by.clone().unwrap_or_default(),
        })
    }
}

/// Parse a Nightscout timestamp as UTC.
///
/// Nightscout emits `2024-03-01T12:34:56.789Z`; the trailing `Z` is dropped and
/// the rest read as a naive UTC time. Offsets such as `+01:00` are honoured.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    let trimmed = raw.trim();
    let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);

    if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(parsed.and_utc());
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ServiceError::format(format!("Invalid timestamp '{}': {}", raw, e)))
}
