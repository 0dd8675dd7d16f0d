//! Session configuration and reconnection policy.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default attempt budget when the caller does not override it.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 240;

/// Fixed delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;

/// How much history the server keeps for resumption (3000 positions at ~400ms).
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 1_200;

/// Transport tuning knobs, passed through to the adapter unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportOptions {
    #[serde(flatten)]
    pub values: BTreeMap<String, serde_json::Value>,
}

impl TransportOptions {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

/// Immutable configuration for one logical session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub endpoint: String,
    pub credential: String,
    /// Caller override for the attempt budget. Never raises it above the
    /// replay-window cap.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_replay_window_secs")]
    pub replay_window_secs: u64,
    #[serde(default)]
    pub transport: TransportOptions,
}

fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}

fn default_replay_window_secs() -> u64 {
    DEFAULT_REPLAY_WINDOW_SECS
}

impl SessionConfig {
    pub fn new(endpoint: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential: credential.into(),
            max_reconnect_attempts: None,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            replay_window_secs: default_replay_window_secs(),
            transport: TransportOptions::default(),
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_transport_options(mut self, options: TransportOptions) -> Self {
        self.transport = options;
        self
    }

    /// Loads configuration from `STREAM_SESSION_*` environment variables.
    ///
    /// Missing endpoint or credential are left empty so [`validate`](Self::validate)
    /// reports them. Numbers that fail to parse fall back to their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("STREAM_SESSION_ENDPOINT").unwrap_or_default(),
            std::env::var("STREAM_SESSION_CREDENTIAL").unwrap_or_default(),
        );

        if let Ok(v) = std::env::var("STREAM_SESSION_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = v.trim().parse().ok();
        }
        if let Ok(v) = std::env::var("STREAM_SESSION_RECONNECT_INTERVAL_MS") {
            config.reconnect_interval_ms = v.trim().parse().unwrap_or(config.reconnect_interval_ms);
        }

        config
    }

    /// Rejects configurations that can never connect.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.endpoint.trim().is_empty() {
            return Err(SessionError::config("endpoint is required"));
        }
        if self.credential.trim().is_empty() {
            return Err(SessionError::config("credential is required"));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(SessionError::config(
                "reconnect_interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            interval: Duration::from_millis(self.reconnect_interval_ms),
            replay_window: Duration::from_secs(self.replay_window_secs),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

/// Fixed-interval retry budget bounded by the server's replay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    pub replay_window: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            replay_window: Duration::from_secs(DEFAULT_REPLAY_WINDOW_SECS),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Number of attempts whose cumulative delay fills the replay window.
    pub fn hard_cap(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let cap = self.replay_window.as_millis() / interval;
        u32::try_from(cap).unwrap_or(u32::MAX)
    }

    pub fn effective_max(&self) -> u32 {
        self.max_attempts
            .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS)
            .min(self.hard_cap())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
