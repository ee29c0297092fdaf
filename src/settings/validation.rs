//! Configuration validation
//!
//! Rejects settings that cannot run before anything is spawned.

use super::config::AppConfig;
use anyhow::{bail, Result};
use tracing::warn;

/// Validate the loaded configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let runner = &config.runner;
    if runner.cols == 0 || runner.rows == 0 {
        bail!("runner.cols and runner.rows must be non-zero");
    }
    if runner.silence_timeout_secs == 0 {
        bail!("runner.silence_timeout_secs must be non-zero");
    }
    if runner.event_capacity == 0 {
        bail!("runner.event_capacity must be non-zero");
    }
    if runner.batch_tiers.is_empty() {
        bail!("runner.batch_tiers needs at least one tier");
    }
    if runner.history_capacity == 0 {
        warn!("runner.history_capacity is 0, duplicate suppression is disabled");
    }

    let slots = &config.slots;
    if slots.max_slots == 0 {
        bail!("slots.max_slots must be at least 1");
    }
    if slots.heartbeat_interval_secs == 0 || slots.heartbeat_interval_secs >= slots.stale_after_secs {
        bail!(
            "slots.heartbeat_interval_secs ({}) must be non-zero and below slots.stale_after_secs ({})",
            slots.heartbeat_interval_secs,
            slots.stale_after_secs
        );
    }
    if slots.retry.max_attempts == 0 {
        bail!("slots.retry.max_attempts must be at least 1");
    }

    for (name, provider) in &config.providers {
        if provider.command.as_deref().is_some_and(|c| c.trim().is_empty()) {
            bail!("providers.{}.command must not be empty", name);
        }
        if provider.max_slots == Some(0) {
            bail!("providers.{}.max_slots must be at least 1", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProviderSettings;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.runner.batch_tiers.clear();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.slots.heartbeat_interval_secs = 600;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.providers.insert(
            "codex".to_string(),
            ProviderSettings {
                command: Some(" ".to_string()),
                ..ProviderSettings::default()
            },
        );
        assert!(validate_config(&config).is_err());
    }
}
