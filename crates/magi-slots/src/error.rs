//! Error types for magi-slots

use thiserror::Error;

/// Slot limiter error type
#[derive(Debug, Error)]
pub enum SlotError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Every slot of the resource class is leased
    #[error("concurrency limit reached for '{resource_class}' ({max_slots} slots in use)")]
    LimitReached {
        /// Resource class that is full
        resource_class: String,
        /// Configured cap
        max_slots: u32,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// SQLite primary result codes for a contended database
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

impl SlotError {
    /// Whether retrying later can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LimitReached { .. } => true,
            Self::Database(sqlx::Error::PoolTimedOut) => true,
            Self::Database(sqlx::Error::Database(db)) => db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SlotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let full = SlotError::LimitReached {
            resource_class: "claude".to_string(),
            max_slots: 2,
        };
        assert!(full.is_retryable());
        assert!(full.to_string().contains("'claude'"));

        assert!(SlotError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!SlotError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(!SlotError::InvalidConfig("bad".to_string()).is_retryable());
    }
}
