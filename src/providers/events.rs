//! Events handed to the calling application

use magi_runner::StreamEvent;
use serde::Serialize;

use super::ProviderKind;

/// Provider-level view of a runner event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    MessageStart {
        session_id: String,
        provider: ProviderKind,
    },
    MessageDelta {
        session_id: String,
        content: String,
        order: u64,
    },
    MessageComplete {
        session_id: String,
        content: String,
        order: u64,
    },
    ConsoleOutput {
        session_id: String,
        content: String,
    },
    Error {
        session_id: String,
        error: String,
    },
}

impl AgentEvent {
    pub fn from_stream(event: StreamEvent, provider: ProviderKind) -> Self {
        match event {
            StreamEvent::Start { session_id } => Self::MessageStart {
                session_id,
                provider,
            },
            StreamEvent::Delta {
                session_id,
                content,
                order,
            } => Self::MessageDelta {
                session_id,
                content,
                order,
            },
            StreamEvent::Complete {
                session_id,
                content,
                order,
            } => Self::MessageComplete {
                session_id,
                content,
                order,
            },
            StreamEvent::SideChannel {
                session_id,
                content,
            } => Self::ConsoleOutput {
                session_id,
                content,
            },
            StreamEvent::Error { session_id, error } => Self::Error { session_id, error },
        }
    }

    /// Content that belongs to the answer, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::MessageDelta { content, .. } | Self::MessageComplete { content, .. } => {
                Some(content)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_mapping_and_wire_format() {
        let event = AgentEvent::from_stream(
            StreamEvent::Delta {
                session_id: "s1".to_string(),
                content: "hello\n".to_string(),
                order: 2,
            },
            ProviderKind::Codex,
        );
        assert_eq!(event.content(), Some("hello\n"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_delta");
        assert_eq!(json["order"], 2);
    }

    #[test]
    fn test_start_carries_provider() {
        let event = AgentEvent::from_stream(
            StreamEvent::Start {
                session_id: "s1".to_string(),
            },
            ProviderKind::ClaudeCode,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_start");
        assert_eq!(json["provider"], "claude_code");
        assert_eq!(event.content(), None);
    }

    #[test]
    fn test_side_channel_is_console_output() {
        let event = AgentEvent::from_stream(
            StreamEvent::SideChannel {
                session_id: "s1".to_string(),
                content: "status: 1.2k".to_string(),
            },
            ProviderKind::ClaudeCode,
        );
        assert!(matches!(event, AgentEvent::ConsoleOutput { ref content, .. } if content == "status: 1.2k"));
    }
}
