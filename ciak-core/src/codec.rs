use crate::model::{FramedMessage, IceCandidate, PeerDescriptor, SessionDescription};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SetSessionDescription,
    AddIceCandidate,
    AddUser,
    ChangeUser,
    CloseRoom,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::SetSessionDescription => "setSessionDescription",
            Action::AddIceCandidate => "addIceCandidate",
            Action::AddUser => "addUser",
            Action::ChangeUser => "changeUser",
            Action::CloseRoom => "closeRoom",
        }
    }

    pub fn from_wire(action: &str) -> Option<Self> {
        match action {
            "setSessionDescription" => Some(Action::SetSessionDescription),
            "addIceCandidate" => Some(Action::AddIceCandidate),
            "addUser" => Some(Action::AddUser),
            "changeUser" => Some(Action::ChangeUser),
            "closeRoom" => Some(Action::CloseRoom),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid payload for '{action}': {source}")]
    Payload {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The `{"action": ..., "value": ...}` object every line carries.
///
/// Kept untyped so the lobby can reuse the framing with its own actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub value: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(action: impl Into<String>, value: &T) -> Result<Self, CodecError> {
        Ok(Self {
            action: action.into(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn parse(line: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    pub fn to_line(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        serde_json::from_value(self.value.clone()).map_err(|source| CodecError::Payload {
            action: self.action.clone(),
            source,
        })
    }
}

/// Encodes one message as a single JSON line, without the trailing newline.
pub fn encode(message: &FramedMessage) -> Result<String, CodecError> {
    let action = message.action().as_str();
    let envelope = match message {
        FramedMessage::SetDescription(description) => Envelope::new(action, description)?,
        FramedMessage::AddIceCandidate(candidate) => Envelope::new(action, candidate)?,
        FramedMessage::AddUser(descriptor) => Envelope::new(action, descriptor)?,
        FramedMessage::ChangeUser | FramedMessage::CloseRoom => Envelope {
            action: action.to_string(),
            value: Value::Object(serde_json::Map::new()),
        },
    };

    envelope.to_line()
}

pub fn decode(line: &str) -> Result<FramedMessage, CodecError> {
    let envelope = Envelope::parse(line)?;
    let action = Action::from_wire(&envelope.action)
        .ok_or_else(|| CodecError::UnknownAction(envelope.action.clone()))?;

    let message = match action {
        Action::SetSessionDescription => {
            FramedMessage::SetDescription(envelope.payload::<SessionDescription>()?)
        }
        Action::AddIceCandidate => FramedMessage::AddIceCandidate(envelope.payload::<IceCandidate>()?),
        Action::AddUser => FramedMessage::AddUser(envelope.payload::<PeerDescriptor>()?),
        Action::ChangeUser => FramedMessage::ChangeUser,
        Action::CloseRoom => FramedMessage::CloseRoom,
    };

    Ok(message)
}
