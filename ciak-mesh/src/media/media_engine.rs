use crate::media::media_event::MediaEvent;
use anyhow::Result;
use async_trait::async_trait;
use ciak_core::{IceCandidate, PeerId, SessionDescription};
use tokio::sync::mpsc;

/// Device-wide media capability: local capture plus a factory for
/// per-peer connections. Owned by the room and shut down with it.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Bring up local capture. Failing here is fatal for the whole room.
    async fn start(&self) -> Result<()>;

    async fn create_peer(
        &self,
        peer_id: PeerId,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Box<dyn MediaPeer>>;

    async fn shutdown(&self);
}

/// One negotiated media connection to one remote device.
///
/// SDP and candidates are opaque payloads; only the owning session calls these.
#[async_trait]
pub trait MediaPeer: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    /// Attach the local video track. Takes effect on the next offer.
    async fn start_video(&self) -> Result<()>;

    async fn stop_video(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
