//! Magi Slots - cross-process concurrency limits
//!
//! Bounds how many instances of a resource class (for example one CLI tool)
//! run at once across every process sharing a SQLite database:
//! - Store: lease table, stale purge, atomic count-and-insert
//! - Limiter: acquire/release with heartbeats
//! - Slot: a held lease, cleaned up on drop

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod lease;
pub mod limiter;
pub mod slot;
pub mod store;

pub use config::LimiterConfig;
pub use error::{Result, SlotError};
pub use lease::{process_identity, SlotLease};
pub use limiter::SlotLimiter;
pub use slot::Slot;
pub use store::SlotStore;
