//! Channel messages
//!
//! The bridge talks to exactly one remote agent over a reliable,
//! topic-addressed data primitive. Two topics are in use:
//! - `chat_message` - text in both directions
//! - `gesture` - gesture symbols, outbound only

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data-message topic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "chat_message")]
    ChatMessage,
    #[serde(rename = "gesture")]
    Gesture,
}

impl Topic {
    pub const CHAT_MESSAGE: &'static str = "chat_message";
    pub const GESTURE: &'static str = "gesture";

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::ChatMessage => Self::CHAT_MESSAGE,
            Topic::Gesture => Self::GESTURE,
        }
    }

    /// Parse a wire topic; unknown topics yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            Self::CHAT_MESSAGE => Some(Topic::ChatMessage),
            Self::GESTURE => Some(Topic::Gesture),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message handed to the transport's reliable send primitive.
/// No acknowledgment is tracked once it has been handed over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: Topic,
    pub payload: String,
}

impl OutboundMessage {
    pub fn new(topic: Topic, payload: impl Into<String>) -> Self {
        OutboundMessage {
            topic,
            payload: payload.into(),
        }
    }

    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }
}

/// Something the remote side produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// Topic-tagged data message
    Data {
        topic: String,
        payload: Vec<u8>,
        sender: Option<String>,
    },
    /// The set of currently speaking participants changed
    ActiveSpeakers(Vec<String>),
}

impl InboundEvent {
    pub fn chat(payload: impl Into<Vec<u8>>) -> Self {
        InboundEvent::Data {
            topic: Topic::CHAT_MESSAGE.to_string(),
            payload: payload.into(),
            sender: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_wire_names() {
        assert_eq!(Topic::ChatMessage.as_str(), "chat_message");
        assert_eq!(Topic::Gesture.as_str(), "gesture");
        assert_eq!(Topic::parse("gesture"), Some(Topic::Gesture));
        assert_eq!(Topic::parse("lk.chat"), None);
    }

    #[test]
    fn test_outbound_payload_bytes() {
        let msg = OutboundMessage::new(Topic::ChatMessage, "héllo");
        assert_eq!(msg.payload_bytes(), "héllo".as_bytes());
    }
}
