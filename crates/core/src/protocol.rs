//! Wire protocol shared by the broker, the dispatcher and every UI client.
//!
//! Each text frame is a JSON object `{"type": "<TAG>", "payload": ...}`.
//! [`Envelope`] is the closed set of frames this system understands;
//! [`RawFrame`] is the tag-agnostic view the relay uses to forward frames
//! it does not need to interpret.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::ui_config::UiConfig;

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// Discriminant of an [`Envelope`], as spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Status,
    UiConfig,
    LogMsg,
    ChatMsg,
    Inventory,
    Alert,
    Job,
    Cmd,
    Say,
    Exit,
}

impl Tag {
    pub const ALL: [Tag; 10] = [
        Tag::Status,
        Tag::UiConfig,
        Tag::LogMsg,
        Tag::ChatMsg,
        Tag::Inventory,
        Tag::Alert,
        Tag::Job,
        Tag::Cmd,
        Tag::Say,
        Tag::Exit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Status => "STATUS",
            Tag::UiConfig => "UI_CONFIG",
            Tag::LogMsg => "LOG_MSG",
            Tag::ChatMsg => "CHAT_MSG",
            Tag::Inventory => "INVENTORY",
            Tag::Alert => "ALERT",
            Tag::Job => "JOB",
            Tag::Cmd => "CMD",
            Tag::Say => "SAY",
            Tag::Exit => "EXIT",
        }
    }

    /// Whether a relayed frame with this tag is reflected back to its sender.
    ///
    /// Chat-visible tags echo so a UI sees its own messages; control and
    /// state tags only go to the other peers.
    pub fn echoes_to_sender(self) -> bool {
        matches!(self, Tag::Say | Tag::ChatMsg | Tag::LogMsg | Tag::Alert)
    }
}

impl FromStr for Tag {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownTag(s.to_string()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Presence of the scripting host, as reported in `STATUS` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Connected,
    Disconnected,
}

/// One stack in an `INVENTORY` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub count: u32,
}

/// Payload of a `JOB` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum JobCommand {
    Start { script: String },
    StopAll,
}

/// Payload of a `CMD` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    ReloadUi,
    Status,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A single frame of the wire protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Envelope {
    #[serde(rename = "STATUS")]
    Status(HostStatus),
    #[serde(rename = "UI_CONFIG")]
    UiConfig(UiConfig),
    #[serde(rename = "LOG_MSG")]
    LogMsg(String),
    #[serde(rename = "CHAT_MSG")]
    ChatMsg(String),
    #[serde(rename = "INVENTORY")]
    Inventory(Vec<InventoryItem>),
    #[serde(rename = "ALERT")]
    Alert(String),
    #[serde(rename = "JOB")]
    Job(JobCommand),
    #[serde(rename = "CMD")]
    Cmd(ControlCommand),
    #[serde(rename = "SAY")]
    Say(String),
    #[serde(rename = "EXIT")]
    Exit,
}

impl Envelope {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::from_raw(RawFrame::parse(text)?)
    }

    /// Interpret an already-split frame.
    pub fn from_raw(raw: RawFrame) -> Result<Self, ProtocolError> {
        let tag: Tag = raw.tag.parse()?;
        let value = raw.payload;

        let envelope = match tag {
            Tag::Status => Envelope::Status(payload(tag, value)?),
            Tag::UiConfig => Envelope::UiConfig(payload(tag, value)?),
            Tag::LogMsg => Envelope::LogMsg(payload(tag, value)?),
            Tag::ChatMsg => Envelope::ChatMsg(payload(tag, value)?),
            Tag::Inventory => Envelope::Inventory(payload(tag, value)?),
            Tag::Alert => Envelope::Alert(payload(tag, value)?),
            Tag::Job => Envelope::Job(payload(tag, value)?),
            Tag::Cmd => Envelope::Cmd(payload(tag, value)?),
            Tag::Say => Envelope::Say(payload(tag, value)?),
            // Clients send `{}` or nothing; the payload carries no meaning.
            Tag::Exit => Envelope::Exit,
        };
        Ok(envelope)
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn tag(&self) -> Tag {
        match self {
            Envelope::Status(_) => Tag::Status,
            Envelope::UiConfig(_) => Tag::UiConfig,
            Envelope::LogMsg(_) => Tag::LogMsg,
            Envelope::ChatMsg(_) => Tag::ChatMsg,
            Envelope::Inventory(_) => Tag::Inventory,
            Envelope::Alert(_) => Tag::Alert,
            Envelope::Job(_) => Tag::Job,
            Envelope::Cmd(_) => Tag::Cmd,
            Envelope::Say(_) => Tag::Say,
            Envelope::Exit => Tag::Exit,
        }
    }

    /// `STATUS: connected` is the frame a scripting host announces itself with.
    pub fn is_host_handshake(&self) -> bool {
        matches!(self, Envelope::Status(HostStatus::Connected))
    }

    pub fn log(message: impl Into<String>) -> Self {
        Envelope::LogMsg(message.into())
    }

    pub fn chat(message: impl Into<String>) -> Self {
        Envelope::ChatMsg(message.into())
    }
}

fn payload<T: DeserializeOwned>(tag: Tag, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        tag: tag.as_str(),
        reason: e.to_string(),
    })
}

/// A frame split into its tag string and untyped payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default)]
    pub payload: Value,
}

impl RawFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The known tag of this frame, if any.
    pub fn known_tag(&self) -> Option<Tag> {
        self.tag.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
