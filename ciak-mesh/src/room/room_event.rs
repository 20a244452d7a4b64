use crate::error::MeshError;
use crate::media::MediaKind;
use crate::room::segment::Segment;
use crate::session::NegotiationState;
use ciak_core::{Director, PeerDescriptor, PeerId};

/// What the room reports to the UI layer.
#[derive(Debug)]
pub enum RoomEvent {
    SessionOpened {
        peer_id: PeerId,
        descriptor: PeerDescriptor,
    },

    SessionStateChanged {
        peer_id: PeerId,
        state: NegotiationState,
    },

    /// A session ended on its own. The rest of the mesh keeps running.
    PeerLost {
        peer_id: PeerId,
        descriptor: PeerDescriptor,
        error: Option<MeshError>,
    },

    /// Every live session is established.
    MeshReady { peers: usize },

    DirectorChanged(Director),

    /// A new director interval began; recording switches source here.
    SegmentStarted(Segment),

    RemoteTrack {
        peer_id: PeerId,
        kind: MediaKind,
    },

    /// The peer announced it is leaving.
    CloseRequested(PeerId),

    /// The room could not start; it is already torn down.
    Fatal(String),

    /// Last event of the room, with every director interval it saw.
    Closed { segments: Vec<Segment> },
}
