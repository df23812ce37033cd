use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub mod framing;

pub use framing::{encode_frame, read_frame, write_frame, MAX_FRAME_SIZE};

/// Server → client channel carrying `{command}` envelopes.
pub const COMMAND_CHANNEL: &str = "command";
/// Client → server channel carrying `{command, room}` envelopes.
pub const MESSAGE_COMMAND_CHANNEL: &str = "message_command";
pub const JOIN_CHANNEL: &str = "join";
pub const JOINED_CHANNEL: &str = "joined";
pub const TEXT_CHANNEL: &str = "text";

const KNOWN_EVENTS: [&str; 3] = ["survey", "confirm_ready", "submit_survey"];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
    #[error("command is not an object")]
    NotACommand,
    #[error("command has no event tag")]
    MissingEvent,
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),
}

/// Opaque identifier of the group of participants a message applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A tagged command, selected by its `event` field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Command {
    Survey { survey: String },
    ConfirmReady { answer: Value },
    SubmitSurvey { answers: Value },
}

impl Command {
    /// Parses a raw command object, separating unknown tags from malformed ones.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let event = match &value {
            Value::Object(map) => match map.get("event") {
                Some(Value::String(tag)) => tag.clone(),
                _ => return Err(ProtocolError::MissingEvent),
            },
            _ => return Err(ProtocolError::NotACommand),
        };

        if !KNOWN_EVENTS.contains(&event.as_str()) {
            return Err(ProtocolError::UnrecognizedCommand(event));
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn event(&self) -> &'static str {
        match self {
            Command::Survey { .. } => "survey",
            Command::ConfirmReady { .. } => "confirm_ready",
            Command::SubmitSurvey { .. } => "submit_survey",
        }
    }
}

/// `{command}` as pushed by the server on [`COMMAND_CHANNEL`].
///
/// The command stays raw so receivers can tell unknown tags apart from
/// transport-level garbage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub command: Value,
}

impl InboundEnvelope {
    pub fn new(command: &Command) -> Result<Self, ProtocolError> {
        Ok(Self {
            command: serde_json::to_value(command)?,
        })
    }

    pub fn parse_command(&self) -> Result<Command, ProtocolError> {
        Command::from_value(self.command.clone())
    }
}

/// `{command, room}` as sent by clients on [`MESSAGE_COMMAND_CHANNEL`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEnvelope {
    pub command: Command,
    pub room: RoomId,
}

#[derive(Deserialize)]
struct RawOutbound {
    command: Value,
    room: RoomId,
}

impl OutboundEnvelope {
    pub fn new(command: Command, room: RoomId) -> Self {
        Self { command, room }
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let raw: RawOutbound = serde_json::from_value(value)?;
        Ok(Self {
            command: Command::from_value(raw.command)?,
            room: raw.room,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Explainer,
    Guesser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joined {
    pub room: RoomId,
    pub user: u32,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub message: String,
    pub room: Option<RoomId>,
}

/// One named-channel message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub channel: String,
    pub payload: Value,
}

impl Frame {
    pub fn new<T: Serialize>(channel: &str, payload: &T) -> Result<Self, ProtocolError> {
        Ok(Self {
            channel: channel.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
