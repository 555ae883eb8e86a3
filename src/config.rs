//! Sync configuration parsed from environment variables.

use std::time::Duration;

use crate::error::SyncError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7654";
pub const DEFAULT_BACKOFF_FLOOR_MS: u64 = 1000;
pub const DEFAULT_BACKOFF_CEILING_MS: u64 = 5000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Reconnect pacing for the push stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// First delay after a fresh manager or a successful open.
    pub floor: Duration,
    /// Upper bound every delay is clamped to.
    pub ceiling: Duration,
    /// Growth factor applied to the running delay after each scheduled reconnect.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor: Duration::from_millis(DEFAULT_BACKOFF_FLOOR_MS),
            ceiling: Duration::from_millis(DEFAULT_BACKOFF_CEILING_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub base_url: String,
    pub backoff: BackoffConfig,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Clear the error surface automatically after this long; `None` keeps
    /// errors until the front-end clears them.
    pub error_clear_after: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            backoff: BackoffConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            error_clear_after: None,
        }
    }
}

impl SyncConfig {
    /// Build typed sync config from environment variables.
    ///
    /// All optional:
    /// - `ALERT_SYNC_BASE_URL`: default `http://127.0.0.1:7654`
    /// - `ALERT_SYNC_BACKOFF_FLOOR_MS`: default 1000
    /// - `ALERT_SYNC_BACKOFF_CEILING_MS`: default 5000
    /// - `ALERT_SYNC_BACKOFF_MULTIPLIER`: default 1.5
    /// - `ALERT_SYNC_REQUEST_TIMEOUT_SECS`: default 30
    /// - `ALERT_SYNC_CONNECT_TIMEOUT_SECS`: default 10
    /// - `ALERT_SYNC_ERROR_CLEAR_SECS`: unset keeps errors until cleared
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` when a value does not parse or the backoff
    /// bounds are inconsistent.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SyncConfig::from_env`] but reads values through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`SyncConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let base_url = lookup("ALERT_SYNC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        let backoff = BackoffConfig {
            floor: Duration::from_millis(parse_or(&lookup, "ALERT_SYNC_BACKOFF_FLOOR_MS", DEFAULT_BACKOFF_FLOOR_MS)?),
            ceiling: Duration::from_millis(parse_or(
                &lookup,
                "ALERT_SYNC_BACKOFF_CEILING_MS",
                DEFAULT_BACKOFF_CEILING_MS,
            )?),
            multiplier: parse_or(&lookup, "ALERT_SYNC_BACKOFF_MULTIPLIER", DEFAULT_BACKOFF_MULTIPLIER)?,
        };
        validate_backoff(&backoff)?;

        let request_timeout =
            Duration::from_secs(parse_or(&lookup, "ALERT_SYNC_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?);
        let connect_timeout =
            Duration::from_secs(parse_or(&lookup, "ALERT_SYNC_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?);
        let error_clear_after = match lookup("ALERT_SYNC_ERROR_CLEAR_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value("ALERT_SYNC_ERROR_CLEAR_SECS", &raw)?)),
            None => None,
        };

        Ok(Self { base_url, backoff, request_timeout, connect_timeout, error_clear_after })
    }

    /// Replace the base URL, normalizing any trailing slash.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        base_url.trim_end_matches('/').clone_into(&mut self.base_url);
        self
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, SyncError> {
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, SyncError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| SyncError::Config(format!("invalid {key}: {raw}")))
}

fn validate_backoff(backoff: &BackoffConfig) -> Result<(), SyncError> {
    if backoff.floor.is_zero() {
        return Err(SyncError::Config("backoff floor must be greater than zero".into()));
    }
    if backoff.floor > backoff.ceiling {
        return Err(SyncError::Config(format!(
            "backoff floor {}ms exceeds ceiling {}ms",
            backoff.floor.as_millis(),
            backoff.ceiling.as_millis()
        )));
    }
    if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
        return Err(SyncError::Config(format!(
            "backoff multiplier must be at least 1.0, got {}",
            backoff.multiplier
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
