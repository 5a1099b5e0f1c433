//! Error types for the monitor.
//!
//! Service errors never escape a poll cycle: the fetcher and alerter log them
//! and carry on. Only configuration errors stop the process.

use thiserror::Error;

/// Unified application error.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// Problems with the environment or command-line configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} must be a valid number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from the Nightscout and Pushover HTTP services.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("Data format error: {message}")]
    Format { message: String },
}

impl ServiceError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format { message: message.into() }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::format(err.to_string())
        } else {
            ServiceError::network(err.to_string())
        }
    }
}
