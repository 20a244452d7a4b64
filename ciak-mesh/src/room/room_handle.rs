use crate::config::MeshConfig;
use crate::error::{MeshError, Result};
use crate::media::MediaEngine;
use crate::room::room::Room;
use crate::room::room_command::RoomCommand;
use crate::room::room_event::RoomEvent;
use crate::room::room_state::RoomSnapshot;
use ciak_core::PeerDescriptor;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Cloneable front door to a running [`Room`] actor.
#[derive(Clone)]
pub struct RoomHandle {
    cmd_tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Spawn the room actor with the peers discovery handed us. Room events
    /// are delivered on the returned receiver until [`RoomEvent::Closed`].
    pub fn start(
        config: MeshConfig,
        engine: Arc<dyn MediaEngine>,
        peers: Vec<PeerDescriptor>,
    ) -> (Self, mpsc::Receiver<RoomEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(100);
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));

        info!(peers = peers.len(), "Starting room");
        let room = Room::new(config, engine, peers, cmd_rx, event_tx);
        tokio::spawn(room.run());

        (Self { cmd_tx }, event_rx)
    }

    pub async fn add_peers(&self, peers: Vec<PeerDescriptor>) -> Result<()> {
        self.cmd_tx
            .send(RoomCommand::AddPeers(peers))
            .await
            .map_err(|_| MeshError::RoomClosed)
    }

    /// Become the director. Fails with `AlreadyDirector` or
    /// `HandoffInProgress` instead of starting a second handoff.
    pub async fn take_director(&self) -> Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::TakeDirector { reply })
            .await
            .map_err(|_| MeshError::RoomClosed)?;
        reply_rx.await.map_err(|_| MeshError::RoomClosed)?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::Snapshot { reply })
            .await
            .map_err(|_| MeshError::RoomClosed)?;
        reply_rx.await.map_err(|_| MeshError::RoomClosed)
    }

    /// Idempotent: disposing a room that already stopped is a no-op.
    pub async fn dispose(&self) {
        let (reply, reply_rx) = oneshot::channel();
        if self.cmd_tx.send(RoomCommand::Dispose { reply }).await.is_ok() {
            let _ = reply_rx.await;
        }
    }
}
