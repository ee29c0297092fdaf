//! Adaptive delta batching
//!
//! Large bursts flush almost immediately; trickling output is coalesced into
//! fewer, larger events. The batcher is deadline based and never sleeps on
//! its own, so the session loop owns the only timer.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// One batching threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTier {
    /// Minimum buffered characters for this tier to apply
    pub min_chars: usize,
    /// Maximum wait before the buffer is flushed
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
}

impl BatchTier {
    /// Create a tier.
    #[must_use]
    pub const fn new(min_chars: usize, timeout: Duration) -> Self {
        Self { min_chars, timeout }
    }
}

/// Tiers sorted by descending `min_chars`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<BatchTier>", into = "Vec<BatchTier>")]
pub struct BatchSchedule {
    tiers: Vec<BatchTier>,
}

impl Default for BatchSchedule {
    fn default() -> Self {
        Self::new(vec![
            BatchTier::new(10_000, Duration::from_millis(10)),
            BatchTier::new(2_000, Duration::from_millis(100)),
            BatchTier::new(100, Duration::from_millis(2_000)),
            BatchTier::new(0, Duration::from_millis(4_000)),
        ])
    }
}

impl BatchSchedule {
    /// Build a schedule; tiers are sorted by descending threshold.
    #[must_use]
    pub fn new(mut tiers: Vec<BatchTier>) -> Self {
        tiers.sort_by(|a, b| b.min_chars.cmp(&a.min_chars));
        Self { tiers }
    }

    /// Tiers in evaluation order.
    #[must_use]
    pub fn tiers(&self) -> &[BatchTier] {
        &self.tiers
    }

    /// Whether the schedule has no tiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Index of the tier for a buffer length: the largest threshold the
    /// length satisfies, falling back to the last tier.
    #[must_use]
    pub fn select(&self, len: usize) -> Option<usize> {
        if self.tiers.is_empty() {
            return None;
        }
        Some(
            self.tiers
                .iter()
                .position(|t| len >= t.min_chars)
                .unwrap_or(self.tiers.len() - 1),
        )
    }
}

impl From<Vec<BatchTier>> for BatchSchedule {
    fn from(tiers: Vec<BatchTier>) -> Self {
        Self::new(tiers)
    }
}

impl From<BatchSchedule> for Vec<BatchTier> {
    fn from(schedule: BatchSchedule) -> Self {
        schedule.tiers
    }
}

/// Pending delta buffer with a single armed deadline.
#[derive(Debug)]
pub struct Batcher {
    schedule: BatchSchedule,
    buffer: String,
    chars: usize,
    armed: Option<(usize, Instant)>,
}

impl Batcher {
    /// Create an empty batcher.
    #[must_use]
    pub fn new(schedule: BatchSchedule) -> Self {
        Self {
            schedule,
            buffer: String::new(),
            chars: 0,
            armed: None,
        }
    }

    /// Append content and (re)arm the deadline if the selected tier changed.
    pub fn push(&mut self, content: &str, now: Instant) {
        self.buffer.push_str(content);
        self.chars += content.chars().count();
        let Some(tier) = self.schedule.select(self.chars) else {
            return;
        };
        match self.armed {
            Some((armed_tier, _)) if armed_tier == tier => {}
            _ => {
                let timeout = self.schedule.tiers[tier].timeout;
                self.armed = Some((tier, now + timeout));
            }
        }
    }

    /// When the armed timer fires, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, at)| at)
    }

    /// Whether the armed deadline has passed.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.armed.is_some_and(|(_, at)| now >= at)
    }

    /// Take the buffered content and clear the timer.
    pub fn flush(&mut self) -> Option<String> {
        self.armed = None;
        self.chars = 0;
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Take whatever is buffered, possibly empty, and clear the timer.
    pub fn drain(&mut self) -> String {
        self.armed = None;
        self.chars = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Buffered character count.
    #[must_use]
    pub fn pending_chars(&self) -> usize {
        self.chars
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_selection() {
        let schedule = BatchSchedule::default();
        let timeout = |len| schedule.tiers()[schedule.select(len).unwrap()].timeout;
        assert_eq!(timeout(0), Duration::from_millis(4_000));
        assert_eq!(timeout(99), Duration::from_millis(4_000));
        assert_eq!(timeout(100), Duration::from_millis(2_000));
        assert_eq!(timeout(2_500), Duration::from_millis(100));
        assert_eq!(timeout(50_000), Duration::from_millis(10));
    }

    #[test]
    fn test_schedule_sorted_and_fallback() {
        let schedule = BatchSchedule::new(vec![
            BatchTier::new(10, Duration::from_millis(50)),
            BatchTier::new(500, Duration::from_millis(5)),
        ]);
        assert_eq!(schedule.tiers()[0].min_chars, 500);
        // Below every threshold: last tier
        assert_eq!(schedule.select(3), Some(1));
        assert_eq!(BatchSchedule::new(Vec::new()).select(3), None);
    }

    #[test]
    fn test_same_tier_keeps_deadline() {
        let start = Instant::now();
        let mut batcher = Batcher::new(BatchSchedule::default());
        batcher.push("a\n", start);
        let first = batcher.deadline().unwrap();
        assert_eq!(first, start + Duration::from_millis(4_000));

        batcher.push("b\n", start + Duration::from_millis(1_000));
        assert_eq!(batcher.deadline(), Some(first));
    }

    #[test]
    fn test_tier_change_rearms() {
        let start = Instant::now();
        let mut batcher = Batcher::new(BatchSchedule::default());
        batcher.push("x", start);
        let big = "y".repeat(2_000);
        let later = start + Duration::from_millis(500);
        batcher.push(&big, later);
        assert_eq!(batcher.deadline(), Some(later + Duration::from_millis(100)));
        assert!(!batcher.is_due(later));
        assert!(batcher.is_due(later + Duration::from_millis(100)));
    }

    #[test]
    fn test_flush_clears_timer() {
        let now = Instant::now();
        let mut batcher = Batcher::new(BatchSchedule::default());
        assert_eq!(batcher.flush(), None);
        batcher.push("hello\n", now);
        assert_eq!(batcher.pending_chars(), 6);
        assert_eq!(batcher.flush().as_deref(), Some("hello\n"));
        assert_eq!(batcher.deadline(), None);
        assert_eq!(batcher.drain(), "");
    }

    #[test]
    fn test_schedule_deserializes_from_millis() {
        let json = r#"[{"min_chars":0,"timeout_ms":250},{"min_chars":64,"timeout_ms":5}]"#;
        let schedule: BatchSchedule = serde_json::from_str(json).unwrap();
        assert_eq!(schedule.tiers()[0].min_chars, 64);
        assert_eq!(schedule.tiers()[1].timeout, Duration::from_millis(250));
    }
}
