//! Monitor configuration from environment variables
//!
//! The daemon takes its entire configuration from the environment (a local
//! `.env` file is loaded first by the binary). The webhook URL is the only
//! required variable; everything else has a deployment default.

use super::api::QueryParams;
use super::filter::FilterParams;
use std::env;
use std::str::FromStr;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Discord webhook target. Required; startup fails without it.
    pub webhook_url: String,
    pub volatility_url: String,
    /// Optional volume endpoint; when unset the volume gate falls back to
    /// turnover figures embedded in volatility rows.
    pub volume_url: Option<String>,

    // Pass-through query parameters
    pub timeframe: String,
    pub threshold: f64,
    pub direction: String,
    pub sort: String,
    pub limit: u32,
    pub offset: u32,

    // Notification policy
    pub max_notifications: usize,
    pub renotify_buffer_minutes: u64,
    pub check_interval_seconds: u64,
    /// 0 disables volume gating.
    pub volume_threshold: f64,

    pub http_timeout_secs: u64,
    pub db_path: String,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} is not a valid value for {}", raw, name))
        }),
        Err(_) => Ok(default),
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DISCORD_WEBHOOK_URL` (required)
    /// - `VOLATILITY_API_URL` (default: https://stg.api.1btc.love/volatility)
    /// - `VOLUME_API_URL` (optional)
    /// - `TIMEFRAME` (default: 4h)
    /// - `THRESHOLD` (default: 5.0)
    /// - `DIRECTION` (default: up)
    /// - `SORT` (default: volatility_desc)
    /// - `LIMIT` (default: 100)
    /// - `OFFSET` (default: 5)
    /// - `MAX_NOTIFICATIONS` (default: 20)
    /// - `RENOTIFY_BUFFER_MINUTES` (default: 60)
    /// - `CHECK_INTERVAL_SECONDS` (default: 300)
    /// - `VOLUME_THRESHOLD` (default: 0, disabled)
    /// - `HTTP_TIMEOUT_SECS` (default: 30)
    /// - `VOLWATCH_DB_PATH` (default: data/volwatch.db)
    pub fn from_env() -> Result<Self, ConfigError> {
        let webhook_url = env::var("DISCORD_WEBHOOK_URL")
            .map_err(|_| ConfigError::MissingVariable("DISCORD_WEBHOOK_URL".to_string()))?;

        let volatility_url = env::var("VOLATILITY_API_URL")
            .unwrap_or_else(|_| "https://stg.api.1btc.love/volatility".to_string());

        let volume_url = env::var("VOLUME_API_URL").ok();

        let config = Self {
            webhook_url,
            volatility_url,
            volume_url,
            timeframe: env::var("TIMEFRAME").unwrap_or_else(|_| "4h".to_string()),
            threshold: parse_var("THRESHOLD", 5.0)?,
            direction: env::var("DIRECTION").unwrap_or_else(|_| "up".to_string()),
            sort: env::var("SORT").unwrap_or_else(|_| "volatility_desc".to_string()),
            limit: parse_var("LIMIT", 100)?,
            offset: parse_var("OFFSET", 5)?,
            max_notifications: parse_var("MAX_NOTIFICATIONS", 20)?,
            renotify_buffer_minutes: parse_var("RENOTIFY_BUFFER_MINUTES", 60)?,
            check_interval_seconds: parse_var("CHECK_INTERVAL_SECONDS", 300)?,
            volume_threshold: parse_var("VOLUME_THRESHOLD", 0.0)?,
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", 30)?,
            db_path: env::var("VOLWATCH_DB_PATH").unwrap_or_else(|_| "data/volwatch.db".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("DISCORD_WEBHOOK_URL", self.webhook_url.as_str()),
            ("VOLATILITY_API_URL", self.volatility_url.as_str()),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        if let Some(url) = &self.volume_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "VOLUME_API_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        if !matches!(self.direction.as_str(), "up" | "down" | "both") {
            return Err(ConfigError::InvalidValue(format!(
                "DIRECTION must be up, down, or both, got {}",
                self.direction
            )));
        }

        if self.check_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "CHECK_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.max_notifications == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_NOTIFICATIONS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn query_params(&self) -> QueryParams {
        QueryParams {
            timeframe: self.timeframe.clone(),
            threshold: self.threshold,
            direction: self.direction.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            threshold: self.threshold,
            volume_threshold: self.volume_threshold,
            max_notifications: self.max_notifications,
        }
    }
}
