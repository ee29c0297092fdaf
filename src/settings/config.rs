//! Configuration types
//!
//! Every section has serde defaults, so a partial file (or none at all)
//! still yields a complete configuration.

use magi_runner::{BatchSchedule, BatchTier, RunnerOptions};
use magi_slots::LimiterConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::SlotBackoff;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for the slot database and other state
    pub data_dir: String,
    pub runner: RunnerSettings,
    pub slots: SlotSettings,
    /// Per-provider overrides, keyed by provider config key
    pub providers: HashMap<String, ProviderSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            runner: RunnerSettings::default(),
            slots: SlotSettings::default(),
            providers: HashMap::new(),
        }
    }
}

/// Runner defaults shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub cols: u16,
    pub rows: u16,
    pub silence_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub history_capacity: usize,
    pub event_capacity: usize,
    pub emit_complete: bool,
    pub batch_tiers: Vec<BatchTier>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            cols: magi_runner::options::DEFAULT_COLS,
            rows: magi_runner::options::DEFAULT_ROWS,
            silence_timeout_secs: magi_runner::options::DEFAULT_SILENCE_TIMEOUT.as_secs(),
            grace_period_secs: magi_runner::options::DEFAULT_GRACE_PERIOD.as_secs(),
            history_capacity: magi_runner::options::DEFAULT_HISTORY_CAPACITY,
            event_capacity: magi_runner::options::DEFAULT_EVENT_CAPACITY,
            emit_complete: true,
            batch_tiers: BatchSchedule::default().tiers().to_vec(),
        }
    }
}

impl RunnerSettings {
    /// Runner options for `cwd` with these defaults applied
    pub fn to_options(&self, cwd: &Path) -> RunnerOptions {
        RunnerOptions::new(cwd)
            .with_size(self.cols, self.rows)
            .with_silence_timeout(Duration::from_secs(self.silence_timeout_secs))
            .with_grace_period(Duration::from_secs(self.grace_period_secs))
            .with_history_capacity(self.history_capacity)
            .with_event_capacity(self.event_capacity)
            .with_emit_complete(self.emit_complete)
            .with_batch_schedule(BatchSchedule::new(self.batch_tiers.clone()))
    }
}

/// Slot limiter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSettings {
    /// Database file; relative paths live under `data_dir`
    pub database: String,
    pub max_slots: u32,
    pub stale_after_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub retry: RetrySettings,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            database: "slots.db".to_string(),
            max_slots: magi_slots::config::DEFAULT_MAX_SLOTS,
            stale_after_secs: magi_slots::config::DEFAULT_STALE_AFTER.as_secs(),
            heartbeat_interval_secs: magi_slots::config::DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
            retry: RetrySettings::default(),
        }
    }
}

impl SlotSettings {
    /// Resolved database path
    pub fn database_path(&self, data_dir: &str) -> PathBuf {
        let path = PathBuf::from(&self.database);
        if path.is_absolute() {
            path
        } else {
            Path::new(data_dir).join(path)
        }
    }

    /// Limiter configuration for one resource class
    pub fn limiter_config(&self, resource_class: &str, max_slots: Option<u32>) -> LimiterConfig {
        LimiterConfig::new(resource_class, max_slots.unwrap_or(self.max_slots))
            .with_stale_after(Duration::from_secs(self.stale_after_secs))
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval_secs))
    }
}

/// Backoff policy for slot acquisition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn to_backoff(&self) -> SlotBackoff {
        SlotBackoff {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }
}

/// Overrides for one provider; unset fields keep the built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub command: Option<String>,
    /// Argument template; `{prompt}` is replaced with the prompt
    pub args: Option<Vec<String>>,
    pub exit_input: Option<String>,
    /// Whether runs take a slot from the limiter
    pub limited: Option<bool>,
    pub resource_class: Option<String>,
    pub max_slots: Option<u32>,
    pub silence_timeout_secs: Option<u64>,
    pub env: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_runner() {
        let settings = RunnerSettings::default();
        assert_eq!(settings.batch_tiers.len(), 4);
        let options = settings.to_options(Path::new("/tmp"));
        assert_eq!(options.silence_timeout, Duration::from_secs(120));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_database_path() {
        let mut slots = SlotSettings::default();
        assert_eq!(slots.database_path("data"), PathBuf::from("data/slots.db"));
        slots.database = "/var/lib/magi/slots.db".to_string();
        assert_eq!(
            slots.database_path("data"),
            PathBuf::from("/var/lib/magi/slots.db")
        );
    }

    #[test]
    fn test_limiter_config_override() {
        let slots = SlotSettings::default();
        let config = slots.limiter_config("claude_code", Some(5));
        assert_eq!(config.resource_class, "claude_code");
        assert_eq!(config.max_slots, 5);
        assert_eq!(config.stale_after, Duration::from_secs(180));
        assert_eq!(slots.limiter_config("x", None).max_slots, 2);
    }
}
