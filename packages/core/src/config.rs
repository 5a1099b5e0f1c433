use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::cli::Cli;
use crate::error::ConfigError;

pub const DEFAULT_SOURCE_TAG: &str = "missed-bolus-detector";
pub const DEFAULT_PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

/// Complete, immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub nightscout: NightscoutConfig,
    pub pushover: PushoverConfig,
    pub monitor: MonitorSettings,
    pub http_timeout: StdDuration,
}

#[derive(Debug, Clone)]
pub struct NightscoutConfig {
    /// API root, e.g. `https://ns.example/api/v1`. No trailing slash.
    pub base_url: String,
    pub token: Option<String>,
    /// Reported as `device` on alert records.
    pub device: String,
}

#[derive(Debug, Clone)]
pub struct PushoverConfig {
    pub app_token: String,
    pub user_key: String,
    pub endpoint: String,
}

/// Matching and polling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Carb entries at or below this many grams are never fetched.
    pub ignore_carbs: u32,
    pub bolus_window: Duration,
    pub lookback_limit: Duration,
    pub loop_time: StdDuration,
    pub carb_fetch_count: u32,
    pub insulin_fetch_count: u32,
    /// How many prior alert records the dedup check inspects.
    pub alert_history_count: u32,
    /// `enteredBy` tag identifying this monitor's alert records.
    pub source_tag: String,
    pub dry_run: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            ignore_carbs: 15,
            bolus_window: Duration::seconds(240),
            lookback_limit: Duration::seconds(1800),
            loop_time: StdDuration::from_secs(240),
            carb_fetch_count: 5,
            insulin_fetch_count: 10,
            alert_history_count: 10,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            dry_run: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidNumber { name, value }),
            }
        };
        let count = |name: &'static str, default: u32| -> Result<u32, ConfigError> {
            let value = number(name, default.into())?;
            u32::try_from(value).map_err(|_| ConfigError::InvalidNumber {
                name,
                value: value.to_string(),
            })
        };
        let window = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            seconds(name, number(name, default)?)
        };

        let defaults = MonitorSettings::default();

        let nightscout = NightscoutConfig {
            base_url: required("NIGHTSCOUT_URL")?.trim_end_matches('/').to_string(),
            token: lookup("NIGHTSCOUT_TOKEN").filter(|t| !t.is_empty()),
            device: lookup("DEVICE_NAME").unwrap_or_else(local_hostname),
        };

        let pushover = PushoverConfig {
            app_token: required("PUSHOVER_TOKEN")?,
            user_key: required("PUSHOVER_USER")?,
            endpoint: lookup("PUSHOVER_URL").unwrap_or_else(|| DEFAULT_PUSHOVER_URL.to_string()),
        };

        let monitor = MonitorSettings {
            ignore_carbs: count("IGNORE_CARBS", defaults.ignore_carbs)?,
            bolus_window: window("BOLUS_WINDOW_SECONDS", 240)?,
            lookback_limit: window("LOOKBACK_LIMIT_SECONDS", 1800)?,
            loop_time: StdDuration::from_secs(number("LOOP_TIME_SECONDS", 240)?),
            carb_fetch_count: count("CARB_FETCH_COUNT", defaults.carb_fetch_count)?,
            insulin_fetch_count: count("INSULIN_FETCH_COUNT", defaults.insulin_fetch_count)?,
            alert_history_count: count("ALERT_HISTORY_COUNT", defaults.alert_history_count)?,
            source_tag: lookup("ALERT_SOURCE_TAG").unwrap_or(defaults.source_tag),
            dry_run: false,
        };

        let config = Self {
            nightscout,
            pushover,
            monitor,
            http_timeout: StdDuration::from_secs(number("HTTP_TIMEOUT_SECONDS", 30)?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_cli(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(url) = &cli.nightscout_url {
            self.nightscout.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = cli.loop_time {
            self.monitor.loop_time = StdDuration::from_secs(secs);
        }
        if let Some(secs) = cli.bolus_window {
            self.monitor.bolus_window = seconds("--bolus-window", secs)?;
        }
        if let Some(secs) = cli.lookback_limit {
            self.monitor.lookback_limit = seconds("--lookback-limit", secs)?;
        }
        self.monitor.dry_run |= cli.dry_run;

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let monitor = &self.monitor;
        if monitor.loop_time.is_zero() {
            return Err(ConfigError::Invalid("LOOP_TIME_SECONDS must be positive".into()));
        }
        if monitor.bolus_window > monitor.lookback_limit {
            return Err(ConfigError::Invalid(format!(
                "bolus window ({}s) exceeds lookback limit ({}s)",
                monitor.bolus_window.num_seconds(),
                monitor.lookback_limit.num_seconds()
            )));
        }
        if monitor.carb_fetch_count == 0 {
            return Err(ConfigError::Invalid("CARB_FETCH_COUNT must be positive".into()));
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::Invalid("HTTP_TIMEOUT_SECONDS must be positive".into()));
        }
        Ok(())
    }
}

/// Whole seconds as a chrono duration, rejecting values it cannot represent.
fn seconds(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| ConfigError::InvalidNumber {
            name,
            value: secs.to_string(),
        })
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
