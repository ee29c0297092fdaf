//! Stream events produced by a runner session

use serde::Serialize;
use std::time::Duration;

/// Events emitted by a session, in order.
///
/// `order` increases monotonically across `Delta` and `Complete` events of
/// one session so consumers can reassemble content even when a transport
/// reorders messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The process was spawned
    Start {
        /// Session identifier
        session_id: String,
    },
    /// A batch of accepted output lines
    Delta {
        /// Session identifier
        session_id: String,
        /// Newline-terminated content
        content: String,
        /// Per-session sequence number
        order: u64,
    },
    /// Final event carrying whatever was still pending at exit
    Complete {
        /// Session identifier
        session_id: String,
        /// Newline-terminated content, possibly empty
        content: String,
        /// Per-session sequence number
        order: u64,
    },
    /// Raw or side-channel output (passthrough lines, predicate signals)
    #[serde(rename = "console")]
    SideChannel {
        /// Session identifier
        session_id: String,
        /// Console content
        content: String,
    },
    /// A contained processing failure
    Error {
        /// Session identifier
        session_id: String,
        /// Error description
        error: String,
    },
}

impl StreamEvent {
    /// Session identifier of any event variant.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Start { session_id }
            | Self::Delta { session_id, .. }
            | Self::Complete { session_id, .. }
            | Self::SideChannel { session_id, .. }
            | Self::Error { session_id, .. } => session_id,
        }
    }

    /// Sequence number for content-bearing events.
    #[must_use]
    pub fn order(&self) -> Option<u64> {
        match self {
            Self::Delta { order, .. } | Self::Complete { order, .. } => Some(*order),
            _ => None,
        }
    }

    /// Content of `Delta` and `Complete` events.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Delta { content, .. } | Self::Complete { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The process exited without being asked to
    Exited,
    /// The completion sentinel was seen and exit was requested
    Sentinel,
    /// No output arrived within the silence timeout
    Silence,
    /// The caller killed the session or dropped the event stream
    Cancelled,
    /// Processing a chunk failed
    ProcessingError,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited => write!(f, "exited"),
            Self::Sentinel => write!(f, "sentinel"),
            Self::Silence => write!(f, "silence"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ProcessingError => write!(f, "processing_error"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// Session identifier
    pub session_id: String,
    /// Exit code, `None` if it could not be determined
    pub exit_code: Option<i32>,
    /// Reason the session ended
    pub termination: Termination,
    /// Number of lines that passed every filter
    pub accepted_lines: usize,
    /// Characters emitted across delta/complete events
    pub emitted_chars: usize,
    /// Wall time from spawn to exit
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl SessionOutcome {
    /// Whether the exit code makes the session a failure.
    ///
    /// Only a self-initiated exit is judged by its code; silence, sentinel,
    /// cancellation and processing errors already explain the exit.
    #[must_use]
    pub fn is_exit_failure(&self) -> bool {
        self.termination == Termination::Exited && self.exit_code.is_some_and(|c| c != 0)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = StreamEvent::Delta {
            session_id: "s1".to_string(),
            content: "hello\n".to_string(),
            order: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "delta");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["order"], 3);

        let console = StreamEvent::SideChannel {
            session_id: "s1".to_string(),
            content: "raw".to_string(),
        };
        let json = serde_json::to_value(&console).unwrap();
        assert_eq!(json["type"], "console");
    }

    #[test]
    fn test_exit_failure_only_for_self_exit() {
        let mut outcome = SessionOutcome {
            session_id: "s1".to_string(),
            exit_code: Some(2),
            termination: Termination::Exited,
            accepted_lines: 0,
            emitted_chars: 0,
            duration: Duration::from_millis(5),
        };
        assert!(outcome.is_exit_failure());

        outcome.termination = Termination::Silence;
        assert!(!outcome.is_exit_failure());

        outcome.termination = Termination::Exited;
        outcome.exit_code = Some(0);
        assert!(!outcome.is_exit_failure());
    }
}
