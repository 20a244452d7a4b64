use crate::codec::Action;
use crate::model::peer::PeerDescriptor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    #[serde(rename = "sessionDescription")]
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub sdp: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u16,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: String,
}

/// A single line on the signaling channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramedMessage {
    SetDescription(SessionDescription),
    AddIceCandidate(IceCandidate),
    /// Relayed by the admin: open a session towards this peer.
    AddUser(PeerDescriptor),
    /// The sender is the new director.
    ChangeUser,
    /// Advisory: the sender is leaving the room.
    CloseRoom,
}

impl FramedMessage {
    pub fn action(&self) -> Action {
        match self {
            FramedMessage::SetDescription(_) => Action::SetSessionDescription,
            FramedMessage::AddIceCandidate(_) => Action::AddIceCandidate,
            FramedMessage::AddUser(_) => Action::AddUser,
            FramedMessage::ChangeUser => Action::ChangeUser,
            FramedMessage::CloseRoom => Action::CloseRoom,
        }
    }
}
