//! Persisted lease records

use crate::error::{Result, SlotError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the lease table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLease {
    /// Unique slot ID
    pub slot_id: Uuid,
    /// Holder identity (`hostname:pid`)
    pub process_id: String,
    /// Bounded resource class
    pub resource_class: String,
    /// Caller-chosen key, for diagnostics
    pub resource_key: String,
    /// When the lease was taken
    pub acquired_at: DateTime<Utc>,
    /// Last heartbeat
    pub last_heartbeat: DateTime<Utc>,
}

impl SlotLease {
    /// A fresh lease owned by `process_id`.
    pub fn new(
        process_id: impl Into<String>,
        resource_class: impl Into<String>,
        resource_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            slot_id: Uuid::new_v4(),
            process_id: process_id.into(),
            resource_class: resource_class.into(),
            resource_key: resource_key.into(),
            acquired_at: now,
            last_heartbeat: now,
        }
    }

    /// Whether the heartbeat is older than `cutoff`.
    #[must_use]
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_heartbeat < cutoff
    }
}

/// Internal row type for database queries
///
/// Timestamps are stored as Unix milliseconds so range comparisons in SQL
/// are numeric.
#[derive(FromRow)]
pub(crate) struct LeaseRow {
    pub slot_id: String,
    pub process_id: String,
    pub resource_class: String,
    pub resource_key: String,
    pub acquired_at: i64,
    pub last_heartbeat: i64,
}

impl TryFrom<LeaseRow> for SlotLease {
    type Error = SlotError;

    fn try_from(row: LeaseRow) -> Result<Self> {
        Ok(SlotLease {
            slot_id: Uuid::parse_str(&row.slot_id)
                .map_err(|e| SlotError::InvalidConfig(format!("Invalid slot ID: {}", e)))?,
            process_id: row.process_id,
            resource_class: row.resource_class,
            resource_key: row.resource_key,
            acquired_at: from_millis(row.acquired_at)?,
            last_heartbeat: from_millis(row.last_heartbeat)?,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| SlotError::InvalidConfig(format!("Invalid timestamp: {}", ms)))
}

/// Identity recorded on every lease this process takes.
pub fn process_identity() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{}:{}", host, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_identity_shape() {
        let id = process_identity();
        let (_, pid) = id.rsplit_once(':').unwrap();
        assert_eq!(pid, std::process::id().to_string());
    }

    #[test]
    fn test_same_holder_and_key_get_distinct_slots() {
        let a = SlotLease::new("host:1", "claude", "task-1");
        let b = SlotLease::new("host:1", "claude", "task-1");
        assert_ne!(a.slot_id, b.slot_id);
        assert_eq!(a.process_id, b.process_id);
        assert_eq!(a.resource_key, b.resource_key);
        assert!(!a.is_stale(a.acquired_at));
    }

    #[test]
    fn test_row_conversion() {
        let row = LeaseRow {
            slot_id: Uuid::new_v4().to_string(),
            process_id: "host:1".to_string(),
            resource_class: "claude".to_string(),
            resource_key: "task-1".to_string(),
            acquired_at: 1_700_000_000_000,
            last_heartbeat: 1_700_000_030_000,
        };
        let lease = SlotLease::try_from(row).unwrap();
        assert_eq!(lease.last_heartbeat.timestamp(), 1_700_000_030);

        let bad = LeaseRow {
            slot_id: "not-a-uuid".to_string(),
            process_id: String::new(),
            resource_class: String::new(),
            resource_key: String::new(),
            acquired_at: 0,
            last_heartbeat: 0,
        };
        assert!(SlotLease::try_from(bad).is_err());
    }
}
