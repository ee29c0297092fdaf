//! A held lease and its heartbeat

use crate::error::Result;
use crate::lease::SlotLease;
use crate::store::SlotStore;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A leased slot.
///
/// Released explicitly through [`Slot::release`] (or the limiter). Dropping
/// an unreleased slot stops the heartbeat and deletes the row in the
/// background when a runtime is available; otherwise the lease expires.
#[derive(Debug)]
pub struct Slot {
    lease: SlotLease,
    store: SlotStore,
    heartbeat: CancellationToken,
    released: AtomicBool,
}

impl Slot {
    /// Wrap a freshly inserted lease and start its heartbeat.
    pub(crate) fn start(lease: SlotLease, store: SlotStore, interval: Duration) -> Self {
        let heartbeat = CancellationToken::new();
        spawn_heartbeat(store.clone(), lease.slot_id, interval, heartbeat.clone());
        Self {
            lease,
            store,
            heartbeat,
            released: AtomicBool::new(false),
        }
    }

    /// Slot ID
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.lease.slot_id
    }

    /// Resource key the slot was acquired for
    #[must_use]
    pub fn resource_key(&self) -> &str {
        &self.lease.resource_key
    }

    /// Resource class the slot counts against
    #[must_use]
    pub fn resource_class(&self) -> &str {
        &self.lease.resource_class
    }

    /// The lease as inserted
    #[must_use]
    pub fn lease(&self) -> &SlotLease {
        &self.lease
    }

    /// Whether the heartbeat is still running
    #[must_use]
    pub fn is_heartbeat_active(&self) -> bool {
        !self.heartbeat.is_cancelled()
    }

    /// Whether the slot was released
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stop the heartbeat and delete the lease row.
    ///
    /// Calling this again is a no-op.
    pub async fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!(slot_id = %self.id(), "Slot already released");
            return Ok(());
        }
        self.heartbeat.cancel();

        match self.store.delete(self.id()).await {
            Ok(deleted) => {
                info!(
                    slot_id = %self.id(),
                    resource_class = %self.lease.resource_class,
                    deleted,
                    "Released slot"
                );
                Ok(())
            }
            Err(e) => {
                // Leave the drop-time cleanup a chance to delete the row
                self.released.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.heartbeat.cancel();
        if self.released.load(Ordering::SeqCst) {
            return;
        }

        let slot_id = self.id();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = self.store.clone();
            handle.spawn(async move {
                match store.delete(slot_id).await {
                    Ok(_) => debug!(slot_id = %slot_id, "Deleted lease of dropped slot"),
                    Err(e) => warn!(slot_id = %slot_id, error = %e, "Failed to delete lease of dropped slot"),
                }
            });
        } else {
            warn!(slot_id = %slot_id, "Slot dropped outside a runtime; lease will expire");
        }
    }
}

fn spawn_heartbeat(store: SlotStore, slot_id: Uuid, interval: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => match store.touch(slot_id, Utc::now()).await {
                    Ok(true) => debug!(slot_id = %slot_id, "Heartbeat"),
                    Ok(false) => {
                        warn!(slot_id = %slot_id, "Lease lost, stopping heartbeat");
                        token.cancel();
                        break;
                    }
                    Err(e) => warn!(slot_id = %slot_id, error = %e, "Heartbeat failed"),
                },
            }
        }
    });
}
