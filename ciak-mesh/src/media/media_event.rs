use ciak_core::IceCandidate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Events a media peer raises towards the session that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Gathered locally, must be forwarded to the remote peer.
    LocalIceCandidate(IceCandidate),

    /// The remote peer started sending a track.
    RemoteTrackAdded(MediaKind),
}
