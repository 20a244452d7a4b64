use crate::error::MeshError;
use crate::media::MediaKind;
use crate::session::NegotiationState;
use ciak_core::{FramedMessage, PeerId};
use std::net::SocketAddr;

/// Events a peer session reports to the room.
#[derive(Debug)]
pub enum SessionEvent {
    Connected(PeerId, SocketAddr),

    StateChanged(PeerId, NegotiationState),

    /// A room-level message (`addUser`, `changeUser`, `closeRoom`) from this peer.
    Message(PeerId, FramedMessage),

    /// A video start request finished: the re-offer was answered, or no
    /// renegotiation was possible.
    VideoSettled(PeerId),

    RemoteTrack(PeerId, MediaKind),

    /// Non-fatal failure; the session keeps running.
    Error(PeerId, MeshError),

    /// Terminal. `None` when the room disposed the session.
    Closed(PeerId, Option<MeshError>),
}
