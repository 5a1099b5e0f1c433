use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::NightscoutConfig;
use crate::error::ServiceError;
use crate::models::{NewTreatment, Treatment};
use crate::services::TreatmentStore;

/// Filtered query against `/treatments.json`.
///
/// Filters map onto Nightscout's `find[...]` query syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentQuery {
    filters: Vec<(String, String)>,
    count: u32,
}

impl TreatmentQuery {
    pub fn new(count: u32) -> Self {
        Self {
            filters: Vec::new(),
            count,
        }
    }

    /// `find[<field>]=<value>`
    pub fn matching(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters.push((format!("find[{}]", field), value.into()));
        self
    }

    /// `find[<field>][$gt]=<threshold>`
    pub fn greater_than(mut self, field: &str, threshold: impl ToString) -> Self {
        self.filters
            .push((format!("find[{}][$gt]", field), threshold.to_string()));
        self
    }

    pub fn event_type(self, event_type: &str) -> Self {
        self.matching("eventType", event_type)
    }

    pub fn entered_by(self, source_tag: &str) -> Self {
        self.matching("enteredBy", source_tag)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Query-string pairs, excluding the auth token.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = self.filters.clone();
        params.push(("count".to_string(), self.count.to_string()));
        params
    }
}

/// HTTP client for the Nightscout v1 REST API.
#[derive(Clone)]
pub struct NightscoutClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl NightscoutClient {
    pub fn new(config: &NightscoutConfig, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServiceError::network(err.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token_param(&self) -> Vec<(&'static str, &str)> {
        self.token
            .as_deref()
            .map(|token| vec![("token", token)])
            .unwrap_or_default()
    }
}

#[async_trait]
impl TreatmentStore for NightscoutClient {
    async fn fetch_treatments(&self, query: &TreatmentQuery) -> Result<Vec<Treatment>, ServiceError> {
        let url = format!("{}/treatments.json", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&query.params())
            .query(&self.token_param())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: "Nightscout",
                status: response.status().as_u16(),
            });
        }

        response
            .json::<Vec<Treatment>>()
            .await
            .map_err(|err| ServiceError::format(err.to_string()))
    }

    async fn create_treatment(&self, treatment: &NewTreatment) -> Result<(), ServiceError> {
        let url = format!("{}/treatments", self.base_url);

        let response = self
            .http
            .post(&url)
            .query(&self.token_param())
            .form(treatment)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: "Nightscout",
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carb_query_uses_find_syntax() {
        let query = TreatmentQuery::new(5)
            .event_type("Carb Correction")
            .greater_than("carbs", 15);

        assert_eq!(
            query.params(),
            vec![
                ("find[eventType]".to_string(), "Carb Correction".to_string()),
                ("find[carbs][$gt]".to_string(), "15".to_string()),
                ("count".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let config = NightscoutConfig {
            base_url: "https://ns.example/api/v1/".into(),
            token: None,
            device: "test".into(),
        };

        let client = NightscoutClient::new(&config, Duration::from_secs(5)).unwrap();

        assert_eq!(client.base_url(), "https://ns.example/api/v1");
    }
}
