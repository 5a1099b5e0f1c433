use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::PushoverConfig;
use crate::error::ServiceError;
use crate::services::Notifier;

/// Pushover "high priority": bypasses quiet hours, no acknowledgement needed.
pub const HIGH_PRIORITY: i8 = 1;

/// A notification body.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub title: String,
    pub message: String,
    pub priority: i8,
}

#[derive(Serialize)]
struct MessageForm<'a> {
    token: &'a str,
    user: &'a str,
    message: &'a str,
    title: &'a str,
    priority: i8,
}

/// Client for the Pushover messages API.
#[derive(Clone)]
pub struct PushoverClient {
    endpoint: String,
    app_token: String,
    user_key: String,
    http: Client,
}

impl PushoverClient {
    pub fn new(config: &PushoverConfig, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServiceError::network(err.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            app_token: config.app_token.clone(),
            user_key: config.user_key.clone(),
            http,
        })
    }
}

#[async_trait]
impl Notifier for PushoverClient {
    async fn send(&self, message: &PushMessage) -> Result<(), ServiceError> {
        let form = MessageForm {
            token: &self.app_token,
            user: &self.user_key,
            message: &message.message,
            title: &message.title,
            priority: message.priority,
        };

        let response = self.http.post(&self.endpoint).form(&form).send().await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: "Pushover",
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    fn notifier_name(&self) -> &str {
        "Pushover"
    }
}
