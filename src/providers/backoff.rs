//! Waiting for a free slot
//!
//! A full resource class is retried with exponential backoff plus up to 25%
//! jitter. Any other limiter error ends the wait at once.

use anyhow::{Context, Result};
use magi_slots::{Slot, SlotLimiter};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// How long and how often to wait for a slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotBackoff {
    /// Acquire attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for SlotBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl SlotBackoff {
    /// Give up after the first rejection
    pub fn no_wait() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before attempt `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let capped = (self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        let base = Duration::from_secs_f64(capped.max(0.0));

        let quarter = base / 4;
        if self.jitter && !quarter.is_zero() {
            base + rand::thread_rng().gen_range(Duration::ZERO..quarter)
        } else {
            base
        }
    }
}

/// Acquire a slot for `resource_key`, waiting while the class is full
pub async fn acquire_slot(
    limiter: &SlotLimiter,
    resource_key: &str,
    backoff: &SlotBackoff,
) -> Result<Slot> {
    let class = &limiter.config().resource_class;
    let mut attempt = 1;
    loop {
        match limiter.acquire(resource_key).await {
            Ok(slot) => {
                if attempt > 1 {
                    info!(resource_class = %class, resource_key, attempt, "Slot acquired after waiting");
                }
                return Ok(slot);
            }
            Err(e) if e.is_retryable() && attempt < backoff.max_attempts => {
                let delay = backoff.delay(attempt);
                debug!(
                    resource_class = %class,
                    resource_key,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Slot busy, waiting"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "No {} slot for {} after {} attempt(s)",
                        class, resource_key, attempt
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magi_slots::{LimiterConfig, SlotError, SlotStore};
    use tempfile::TempDir;

    fn fixed(max_attempts: u32, delay_ms: u64) -> SlotBackoff {
        SlotBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(delay_ms),
            max_delay: Duration::from_secs(1),
            multiplier: 1.0,
            jitter: false,
        }
    }

    async fn limiter(dir: &TempDir) -> SlotLimiter {
        let store = SlotStore::from_path(&dir.path().join("slots.db")).await.unwrap();
        SlotLimiter::new(store, LimiterConfig::new("codex", 1)).unwrap()
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let backoff = SlotBackoff {
            jitter: false,
            ..SlotBackoff::default()
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));
        assert_eq!(backoff.delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let backoff = SlotBackoff::default();
        for _ in 0..50 {
            let delay = backoff.delay(3);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay < Duration::from_secs(5));
        }
    }

    #[tokio::test]
    async fn test_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let limiter = limiter(&dir).await;
        let held = limiter.acquire("first").await.unwrap();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            held.release().await.unwrap();
        });

        let slot = acquire_slot(&limiter, "second", &fixed(50, 20)).await.unwrap();
        assert_eq!(slot.resource_key(), "second");
        releaser.await.unwrap();
        slot.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_with_limit_reached() {
        let dir = TempDir::new().unwrap();
        let limiter = limiter(&dir).await;
        let _held = limiter.acquire("first").await.unwrap();

        let err = acquire_slot(&limiter, "second", &fixed(3, 5)).await.unwrap_err();
        assert!(err.to_string().contains("after 3 attempt(s)"));
        assert!(matches!(
            err.downcast_ref::<SlotError>(),
            Some(SlotError::LimitReached { max_slots: 1, .. })
        ));

        let err = acquire_slot(&limiter, "third", &SlotBackoff::no_wait()).await.unwrap_err();
        assert!(err.to_string().contains("after 1 attempt(s)"));
    }
}
