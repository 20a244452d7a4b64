use crate::error::Result;
use crate::room::room_state::RoomSnapshot;
use ciak_core::PeerDescriptor;
use tokio::sync::oneshot;

/// Requests handled by the room actor, sent through a [`RoomHandle`](crate::RoomHandle).
#[derive(Debug)]
pub enum RoomCommand {
    /// Open one session per descriptor, skipping addresses already held.
    AddPeers(Vec<PeerDescriptor>),

    /// Make this device the director.
    TakeDirector { reply: oneshot::Sender<Result<()>> },

    Snapshot { reply: oneshot::Sender<RoomSnapshot> },

    /// Tell connected peers we leave, then tear everything down.
    Dispose { reply: oneshot::Sender<()> },
}
