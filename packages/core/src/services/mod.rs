//! External service clients and the traits the monitor consumes them through.

pub mod nightscout;
pub mod pushover;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{NewTreatment, Treatment};

pub use nightscout::{NightscoutClient, TreatmentQuery};
pub use pushover::{PushMessage, PushoverClient};

/// Read/write access to the diabetes data service's treatments collection.
#[async_trait]
pub trait TreatmentStore {
    /// Run a filtered query, newest entries first.
    async fn fetch_treatments(&self, query: &TreatmentQuery) -> Result<Vec<Treatment>, ServiceError>;

    /// Create one treatment record.
    async fn create_treatment(&self, treatment: &NewTreatment) -> Result<(), ServiceError>;
}

/// Delivers a push notification to the operator.
#[async_trait]
pub trait Notifier {
    async fn send(&self, message: &PushMessage) -> Result<(), ServiceError>;

    /// Name of the backend for logging.
    fn notifier_name(&self) -> &str;
}
