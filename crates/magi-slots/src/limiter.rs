//! Cross-process concurrency limiter
//!
//! ## Acquire
//!
//! ```text
//! 1. purge leases whose heartbeat is older than the stale window
//! 2. BEGIN IMMEDIATE; count leases of the class; insert if below the cap
//! 3. start the heartbeat
//! ```
//!
//! A full class is reported as `SlotError::LimitReached`; the limiter never
//! retries on its own.

use crate::config::LimiterConfig;
use crate::error::{Result, SlotError};
use crate::lease::{process_identity, SlotLease};
use crate::slot::Slot;
use crate::store::SlotStore;
use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::{info, warn};

/// Caps live leases of one resource class across processes.
#[derive(Debug, Clone)]
pub struct SlotLimiter {
    store: SlotStore,
    config: LimiterConfig,
    process_id: String,
}

impl SlotLimiter {
    /// Create a limiter over `store`.
    pub fn new(store: SlotStore, config: LimiterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            process_id: process_identity(),
        })
    }

    /// Override the holder identity recorded on leases.
    #[must_use]
    pub fn with_process_id(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = process_id.into();
        self
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Store in use
    #[must_use]
    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    /// Take a slot, or fail with `LimitReached` when the class is full.
    pub async fn acquire(&self, resource_key: &str) -> Result<Slot> {
        self.purge_stale().await?;

        let lease = SlotLease::new(&self.process_id, &self.config.resource_class, resource_key);
        if !self
            .store
            .insert_if_below(&lease, self.config.max_slots)
            .await?
        {
            warn!(
                resource_class = %self.config.resource_class,
                resource_key = %resource_key,
                max_slots = self.config.max_slots,
                "Slot rejected, concurrency limit reached"
            );
            return Err(SlotError::LimitReached {
                resource_class: self.config.resource_class.clone(),
                max_slots: self.config.max_slots,
            });
        }

        info!(
            slot_id = %lease.slot_id,
            resource_class = %self.config.resource_class,
            resource_key = %resource_key,
            "Acquired slot"
        );
        Ok(Slot::start(
            lease,
            self.store.clone(),
            self.config.heartbeat_interval,
        ))
    }

    /// Release a slot. Releasing twice is a no-op.
    pub async fn release(&self, slot: &Slot) -> Result<()> {
        slot.release().await
    }

    /// Run `f` while holding a slot; the slot is released on every path.
    pub async fn with_slot<F, Fut, T>(&self, resource_key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let slot = self.acquire(resource_key).await?;
        let output = f().await;
        if let Err(e) = slot.release().await {
            warn!(slot_id = %slot.id(), error = %e, "Failed to release slot");
        }
        Ok(output)
    }

    /// Leases of this class with a fresh heartbeat
    pub async fn live_count(&self) -> Result<u32> {
        self.store
            .count_live(&self.config.resource_class, self.stale_cutoff()?)
            .await
    }

    /// All leases of this class, stale ones included
    pub async fn leases(&self) -> Result<Vec<SlotLease>> {
        self.store.list(Some(&self.config.resource_class)).await
    }

    /// Delete stale leases of any class; returns how many were removed.
    pub async fn purge_stale(&self) -> Result<u64> {
        let purged = self.store.purge_stale(self.stale_cutoff()?).await?;
        if purged > 0 {
            info!(purged, "Purged stale leases");
        }
        Ok(purged)
    }

    fn stale_cutoff(&self) -> Result<DateTime<Utc>> {
        let window = chrono::Duration::from_std(self.config.stale_after)
            .map_err(|e| SlotError::InvalidConfig(format!("Invalid stale window: {}", e)))?;
        Ok(Utc::now() - window)
    }
}
