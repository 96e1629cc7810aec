//! Inbound envelopes and outbound frames.
//!
//! Inbound frames are decoded in two steps: the `type` tag first, then the
//! fields that tag requires. A frame whose fields are missing or mistyped
//! becomes [`Envelope::Malformed`] so the reader can report it and move on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types the engine recognizes but attaches no behavior to.
pub const IGNORED_TYPES: &[&str] = &[
    "user_typing",
    "channel_joined",
    "channel_left",
    "presence_change",
    "reconnect_url",
];

/// Fields of a `message` event that dispatch needs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    /// Conversation the message was posted in.
    pub channel: String,
    /// Author id.
    pub user: String,
    /// Gateway timestamp, kept opaque.
    pub ts: String,
    /// Raw message text.
    pub text: String,
}

/// One classified inbound event.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    /// Stream greeting sent once after connecting.
    Hello,
    /// A text message.
    Message(MessageEvent),
    /// A recognized type with no attached behavior.
    Ignored(String),
    /// A type tag the engine does not know.
    Unknown {
        /// The type tag.
        kind: String,
        /// The full frame, for reporting.
        raw: Value,
    },
    /// A frame whose type-specific fields could not be extracted.
    Malformed {
        /// The type tag (or its JSON rendering if it was not a string).
        kind: String,
        /// What was wrong.
        reason: String,
    },
}

impl Envelope {
    /// Decode a text frame.
    ///
    /// Returns `Ok(None)` for frames without a `type` tag (reply acks and
    /// the like) and `Err` only when the text is not JSON at all.
    pub fn decode(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    /// Classify an already-parsed frame.
    pub fn from_value(value: Value) -> Option<Self> {
        let tag = value.get("type")?;
        let Some(kind) = tag.as_str() else {
            return Some(Self::Malformed {
                kind: tag.to_string(),
                reason: "type tag is not a string".into(),
            });
        };

        let envelope = match kind {
            "hello" => Self::Hello,
            "message" => match MessageEvent::deserialize(&value) {
                Ok(event) => Self::Message(event),
                Err(e) => Self::Malformed {
                    kind: kind.to_owned(),
                    reason: e.to_string(),
                },
            },
            k if IGNORED_TYPES.contains(&k) => Self::Ignored(k.to_owned()),
            k => Self::Unknown {
                kind: k.to_owned(),
                raw: value,
            },
        };
        Some(envelope)
    }

    /// The type tag this envelope was classified from.
    pub fn kind(&self) -> &str {
        match self {
            Self::Hello => "hello",
            Self::Message(_) => "message",
            Self::Ignored(kind) | Self::Unknown { kind, .. } | Self::Malformed { kind, .. } => kind,
        }
    }
}

/// Outbound reply frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundFrame {
    /// Per-session message id.
    pub id: u64,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Target conversation.
    pub channel: String,
    /// Reply body.
    pub text: String,
}

impl OutboundFrame {
    /// Build a `message` frame.
    pub fn message(id: u64, channel: String, text: String) -> Self {
        Self {
            id,
            kind: "message",
            channel,
            text,
        }
    }
}
