//! Limiter configuration

use crate::error::{Result, SlotError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of concurrent leases per resource class.
pub const DEFAULT_MAX_SLOTS: u32 = 2;
/// Leases whose heartbeat is older than this are presumed dead.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(180);
/// Interval between heartbeats of a held lease.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration of one bounded resource class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Resource class the cap applies to
    pub resource_class: String,
    /// Maximum live leases
    pub max_slots: u32,
    /// Expiry window for stale leases
    #[serde(rename = "stale_after_secs", with = "secs")]
    pub stale_after: Duration,
    /// Heartbeat period
    #[serde(rename = "heartbeat_interval_secs", with = "secs")]
    pub heartbeat_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            resource_class: "default".to_string(),
            max_slots: DEFAULT_MAX_SLOTS,
            stale_after: DEFAULT_STALE_AFTER,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl LimiterConfig {
    /// Configuration for a resource class with default timings.
    pub fn new(resource_class: impl Into<String>, max_slots: u32) -> Self {
        Self {
            resource_class: resource_class.into(),
            max_slots,
            ..Self::default()
        }
    }

    /// Set the stale expiry window.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Set the heartbeat period.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Reject configurations that cannot hold a lease.
    pub fn validate(&self) -> Result<()> {
        if self.resource_class.trim().is_empty() {
            return Err(SlotError::InvalidConfig(
                "resource class must not be empty".to_string(),
            ));
        }
        if self.max_slots == 0 {
            return Err(SlotError::InvalidConfig(
                "max_slots must be at least 1".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(SlotError::InvalidConfig(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }
        if self.heartbeat_interval >= self.stale_after {
            return Err(SlotError::InvalidConfig(format!(
                "heartbeat interval ({}s) must be shorter than the stale window ({}s)",
                self.heartbeat_interval.as_secs(),
                self.stale_after.as_secs()
            )));
        }
        Ok(())
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LimiterConfig::default();
        assert_eq!(config.stale_after, Duration::from_secs(180));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(LimiterConfig::new("claude", 0).validate().is_err());
        assert!(LimiterConfig::new("  ", 2).validate().is_err());
        assert!(LimiterConfig::new("claude", 2)
            .with_heartbeat_interval(Duration::from_secs(200))
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LimiterConfig =
            serde_json::from_str(r#"{"resource_class": "claude", "stale_after_secs": 60}"#)
                .unwrap();
        assert_eq!(config.resource_class, "claude");
        assert_eq!(config.max_slots, DEFAULT_MAX_SLOTS);
        assert_eq!(config.stale_after, Duration::from_secs(60));
    }
}
